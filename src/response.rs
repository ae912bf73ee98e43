use serde::Serialize;

/// Envelope every endpoint answers with: `{success, data?, error?, details?}`.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

pub fn ok<T: Serialize>(data: T) -> axum::Json<ApiResponse<T>> {
    axum::Json(ApiResponse {
        success: true,
        data: Some(data),
        error: None,
        details: None,
    })
}

pub fn failure(error: impl Into<String>, details: Option<serde_json::Value>) -> ApiResponse<()> {
    ApiResponse {
        success: false,
        data: None,
        error: Some(error.into()),
        details,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_envelope_omits_error_fields() {
        let json = serde_json::to_value(&ok(serde_json::json!({"n": 1})).0).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["data"]["n"], 1);
        assert!(json.get("error").is_none());
        assert!(json.get("details").is_none());
    }

    #[test]
    fn failure_envelope_carries_error_and_details() {
        let json = serde_json::to_value(failure(
            "Invalid input",
            Some(serde_json::json!([{"field": "email"}])),
        ))
        .unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "Invalid input");
        assert_eq!(json["details"][0]["field"], "email");
        assert!(json.get("data").is_none());
    }
}
