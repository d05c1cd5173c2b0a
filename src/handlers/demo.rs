use crate::schemas::{ApiError, ApiResponse, error_response};
use axum::{Form, extract::Path, http::StatusCode, response::Json};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};
use utoipa::ToSchema;

/// Form body of the greeting endpoint
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct HelloForm {
    pub name: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct CalcRequest {
    pub value1: i64,
    pub value2: i64,
    /// `-` subtracts, `x` multiplies, anything else adds
    pub operator: String,
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct CalcResponse {
    pub value1: i64,
    pub value2: i64,
    pub operator: String,
    pub result: i64,
}

/// `None` on overflow.
pub fn calculate(value1: i64, operator: &str, value2: i64) -> Option<i64> {
    match operator {
        "-" => value1.checked_sub(value2),
        "x" => value1.checked_mul(value2),
        _ => value1.checked_add(value2),
    }
}

fn calc_response(value1: i64, operator: String, value2: i64) -> Result<Json<ApiResponse<CalcResponse>>, ApiError> {
    match calculate(value1, &operator, value2) {
        Some(result) => {
            debug!("{} {} {} = {}", value1, operator, value2, result);
            Ok(ApiResponse::ok(
                CalcResponse {
                    value1,
                    value2,
                    operator,
                    result,
                },
                "Calculated",
            ))
        }
        None => {
            warn!("Calculation overflow: {} {} {}", value1, operator, value2);
            Err(error_response(StatusCode::BAD_REQUEST, "OVERFLOW", "Result does not fit in a 64-bit integer"))
        }
    }
}

/// Greeting
#[utoipa::path(
    get,
    path = "/api/v1/hello",
    tag = "demo",
    responses((status = 200, description = "Greeting", body = ApiResponse<String>))
)]
#[instrument]
pub async fn hello() -> Json<ApiResponse<String>> {
    ApiResponse::ok("Hello from the LMS API".to_string(), "OK")
}

/// Personalised greeting, or a farewell when no name is given
#[utoipa::path(
    post,
    path = "/api/v1/hello",
    tag = "demo",
    request_body(content = HelloForm, content_type = "application/x-www-form-urlencoded"),
    responses((status = 200, description = "Greeting", body = ApiResponse<String>))
)]
#[instrument]
pub async fn hello_post(Form(form): Form<HelloForm>) -> Json<ApiResponse<String>> {
    let message = match form.name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
        Some(name) => format!("Enjoy your learning, {}", name),
        None => "Goodbye, see you again".to_string(),
    };
    ApiResponse::ok(message, "OK")
}

/// Calculator with operands in the path
#[utoipa::path(
    get,
    path = "/api/v1/calc/{value1}/{operator}/{value2}",
    tag = "demo",
    params(
        ("value1" = i64, Path, description = "Left operand"),
        ("operator" = String, Path, description = "Operator: -, x, anything else adds"),
        ("value2" = i64, Path, description = "Right operand"),
    ),
    responses(
        (status = 200, description = "Result", body = ApiResponse<CalcResponse>),
        (status = 400, description = "Overflow or malformed operand", body = ErrorResponse)
    )
)]
#[instrument]
pub async fn calc_path(
    Path((value1, operator, value2)): Path<(i64, String, i64)>,
) -> Result<Json<ApiResponse<CalcResponse>>, ApiError> {
    calc_response(value1, operator, value2)
}

/// Calculator with a JSON body
#[utoipa::path(
    post,
    path = "/api/v1/calc",
    tag = "demo",
    request_body = CalcRequest,
    responses(
        (status = 200, description = "Result", body = ApiResponse<CalcResponse>),
        (status = 400, description = "Overflow", body = ErrorResponse)
    )
)]
#[instrument]
pub async fn calc_post(Json(request): Json<CalcRequest>) -> Result<Json<ApiResponse<CalcResponse>>, ApiError> {
    calc_response(request.value1, request.operator, request.value2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calculate() {
        assert_eq!(calculate(7, "-", 3), Some(4));
        assert_eq!(calculate(7, "x", 3), Some(21));
        assert_eq!(calculate(7, "+", 3), Some(10));
        assert_eq!(calculate(7, "%", 3), Some(10));
        assert_eq!(calculate(i64::MAX, "+", 1), None);
    }
}
