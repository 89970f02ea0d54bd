//! The fixed tool registry offered to the model.

use serde_json::json;

use crate::model::ToolSpec;

pub const SEARCH_POI: &str = "search_poi";
pub const SEARCH_NEARBY: &str = "search_nearby";
pub const SEARCH_KNOWLEDGE_BASE: &str = "search_knowledge_base";

/// Specifications for the three built-in tools.
pub fn builtin_specs() -> Vec<ToolSpec> {
    vec![
        ToolSpec {
            name: SEARCH_POI.to_string(),
            description: "Search for a specific place, attraction, or location by name.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "keywords": {
                        "type": "string",
                        "description": "The name of the place to search for (e.g., 'Forbidden City', 'West Lake')."
                    },
                    "city": {
                        "type": "string",
                        "description": "The city name (optional, e.g., 'Beijing')."
                    }
                },
                "required": ["keywords"]
            }),
        },
        ToolSpec {
            name: SEARCH_NEARBY.to_string(),
            description:
                "Search for facilities (like hotels, parking, restaurants) near a specific coordinate location."
                    .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "location": {
                        "type": "string",
                        "description": "The center coordinate in 'lng,lat' format (e.g., '116.397428,39.90923')."
                    },
                    "keywords": {
                        "type": "string",
                        "description": "The type of facility to search for (e.g., 'parking', 'hotel', 'toilet')."
                    },
                    "radius": {
                        "type": "integer",
                        "description": "Search radius in meters (default 1000)."
                    }
                },
                "required": ["location", "keywords"]
            }),
        },
        ToolSpec {
            name: SEARCH_KNOWLEDGE_BASE.to_string(),
            description:
                "Search for exclusive travel tips, hidden gems, money-saving tricks, or avoiding tourist traps. Use this when the user asks for advice, guides, or 'secret' spots."
                    .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "The semantic search query (e.g., 'Beijing scams', 'Hangzhou hidden spots')."
                    }
                },
                "required": ["query"]
            }),
        },
    ]
}
