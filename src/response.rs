use serde::Serialize;
use serde_json::Value;

/// Envelope shared by every endpoint: `{ success, message?, data?, meta? }`.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            message: None,
            data: Some(data),
            meta: None,
        }
    }

    pub fn with_message(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            data: Some(data),
            meta: None,
        }
    }

    pub fn meta(mut self, meta: Value) -> Self {
        self.meta = Some(meta);
        self
    }
}

impl ApiResponse<()> {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            data: None,
            meta: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            data: None,
            meta: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn absent_members_are_omitted() {
        let body = serde_json::to_value(ApiResponse::ok(vec![1, 2])).unwrap();
        assert_eq!(body, json!({ "success": true, "data": [1, 2] }));

        let body = serde_json::to_value(ApiResponse::failure("Student not found")).unwrap();
        assert_eq!(body, json!({ "success": false, "message": "Student not found" }));
    }

    #[test]
    fn meta_is_attached() {
        let body = ApiResponse::ok(Vec::<u8>::new()).meta(json!({ "page": 1, "pageSize": 10, "total": 0 }));
        let body = serde_json::to_value(body).unwrap();
        assert_eq!(body["meta"]["pageSize"], 10);
        assert_eq!(body["data"], json!([]));
    }
}
