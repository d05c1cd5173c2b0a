#[cfg(test)]
mod tests {
    use crate::schemas::ApiDoc;
    use utoipa::OpenApi;
    use utoipa::openapi::PathItemType;

    fn object_properties(name: &str) -> Vec<String> {
        let openapi = ApiDoc::openapi();
        let components = openapi.components.as_ref().unwrap();
        match components.schemas.get(name).unwrap() {
            utoipa::openapi::RefOr::T(utoipa::openapi::schema::Schema::Object(obj)) => {
                obj.properties.keys().cloned().collect()
            }
            _ => panic!("{} should be an object schema", name),
        }
    }

    #[test]
    fn test_openapi_schema_generation() {
        let openapi = ApiDoc::openapi();

        assert!(openapi.components.is_some());
        let components = openapi.components.as_ref().unwrap();

        for name in [
            "ErrorResponse",
            "HealthResponse",
            "UserResponse",
            "CourseDetailResponse",
            "CourseContentsResponse",
            "CompletionResponse",
            "DashboardResponse",
            "StatsResponse",
        ] {
            assert!(components.schemas.contains_key(name), "missing schema {}", name);
        }

        assert!(serde_json::to_string(&openapi).is_ok());
        assert!(serde_yaml::to_string(&openapi).is_ok());
    }

    #[test]
    fn test_error_response_schema_structure() {
        let properties = object_properties("ErrorResponse");

        assert!(properties.contains(&"error".to_string()));
        assert!(properties.contains(&"code".to_string()));
        assert!(properties.contains(&"success".to_string()));
    }

    #[test]
    fn test_user_response_hides_password() {
        let properties = object_properties("UserResponse");

        assert!(properties.contains(&"username".to_string()));
        assert!(properties.contains(&"is_staff".to_string()));
        assert!(!properties.iter().any(|p| p.contains("password")));
    }

    #[test]
    fn test_openapi_paths_contain_health_endpoint() {
        let openapi = ApiDoc::openapi();

        let health_path = openapi.paths.paths.get("/health").unwrap();
        let health_get = health_path.operations.get(&PathItemType::Get).unwrap();

        assert!(health_get.responses.responses.contains_key("200"));
        let unhealthy = health_get.responses.responses.get("500").unwrap();
        let unhealthy_json = serde_json::to_string(unhealthy).unwrap();
        assert!(unhealthy_json.contains("#/components/schemas/ErrorResponse"));
    }

    #[test]
    fn test_openapi_paths_cover_api_routes() {
        let openapi = ApiDoc::openapi();
        let paths = &openapi.paths.paths;

        let expected = [
            ("/api/v1/auth/sign-in", PathItemType::Post),
            ("/api/v1/register", PathItemType::Post),
            ("/api/v1/calc/{value1}/{operator}/{value2}", PathItemType::Get),
            ("/api/v1/courses", PathItemType::Get),
            ("/api/v1/courses/{course_id}", PathItemType::Delete),
            ("/api/v1/courses/{course_id}/enroll", PathItemType::Post),
            ("/api/v1/courses/{course_id}/contents/{content_id}", PathItemType::Get),
            ("/api/v1/courses/{course_id}/contents/import", PathItemType::Post),
            ("/api/v1/comments/{comment_id}", PathItemType::Put),
            ("/api/v1/contents/{content_id}/complete", PathItemType::Post),
            ("/api/v1/stats", PathItemType::Get),
        ];

        for (path, method) in expected {
            let item = paths.get(path).unwrap_or_else(|| panic!("missing path {}", path));
            assert!(item.operations.contains_key(&method), "missing method on {}", path);
        }
    }

    #[test]
    fn test_import_documents_csv_body() {
        let openapi = ApiDoc::openapi();
        let item = openapi
            .paths
            .paths
            .get("/api/v1/courses/{course_id}/contents/import")
            .unwrap();
        let operation = item.operations.get(&PathItemType::Post).unwrap();
        let body = operation.request_body.as_ref().unwrap();

        assert!(body.content.contains_key("text/csv"));
        assert!(operation.responses.responses.contains_key("201"));
        assert!(operation.responses.responses.contains_key("400"));
    }

    #[test]
    fn test_all_error_responses_reference_correct_schema() {
        let openapi = ApiDoc::openapi();
        let openapi_json = serde_json::to_string(&openapi).unwrap();

        assert!(!openapi_json.contains("crate.schemas.ErrorResponse"));
        assert!(!openapi_json.contains("crate::schemas::ErrorResponse"));
        assert!(openapi_json.contains("#/components/schemas/ErrorResponse"));
    }
}
