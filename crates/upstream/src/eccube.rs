use hm_relay_core::{AccessToken, CustomerId, CustomerRecord};
use reqwest::{Client, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::json;
use thiserror::Error;
use url::Url;

/// Customer fields requested from the GraphQL API, in query order.
pub const CUSTOMER_FIELDS: [&str; 6] = [
    "id",
    "name01",
    "name02",
    "email",
    "company_name",
    "phone_number",
];

/// Client for the EC-CUBE GraphQL API.
#[derive(Clone)]
pub struct EcCubeClient {
    http: Client,
    endpoint: Url,
}

impl EcCubeClient {
    pub fn new(endpoint: Url, http: Client) -> Self {
        Self { http, endpoint }
    }

    /// Fetches one customer by id.
    ///
    /// Returns `Ok(None)` when the API answers without errors but the
    /// customer is `null` (not visible yet, or deleted).
    pub async fn fetch_customer(
        &self,
        access_token: &AccessToken,
        customer_id: CustomerId,
    ) -> Result<Option<CustomerRecord>, EcCubeError> {
        let body = json!({
            "query": customer_query(customer_id),
            "variables": {},
        });

        let response = self
            .http
            .post(self.endpoint.clone())
            .header("Authorization", format!("Bearer {}", access_token.as_str()))
            .json(&body)
            .send()
            .await?;

        let envelope: GraphQlResponse<CustomerData> = parse_json(response).await?;
        if let Some(errors) = envelope.errors.filter(|errors| !errors.is_empty()) {
            return Err(EcCubeError::GraphQl(
                errors.into_iter().map(|err| err.message).collect(),
            ));
        }

        Ok(envelope.data.and_then(|data| data.customer))
    }
}

/// Builds the customer lookup query. The id is an integer, so it is safe to
/// inline.
pub fn customer_query(customer_id: CustomerId) -> String {
    let fields = CUSTOMER_FIELDS
        .iter()
        .map(|field| format!("    {field}"))
        .collect::<Vec<_>>()
        .join("\n");
    format!("{{\n  customer(id: {customer_id}) {{\n{fields}\n  }}\n}}")
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Option<Vec<GraphQlError>>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct CustomerData {
    customer: Option<CustomerRecord>,
}

/// Errors produced by the EC-CUBE client.
#[derive(Debug, Error)]
pub enum EcCubeError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected status {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("graphql errors: {}", .0.join("; "))]
    GraphQl(Vec<String>),
}

impl EcCubeError {
    /// Whether another attempt may succeed. Client errors (bad or expired
    /// token, malformed query) are final.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(err) => !err.is_decode() && !err.is_builder(),
            Self::Status { status, .. } => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            }
            Self::GraphQl(_) => true,
        }
    }
}

async fn parse_json<T>(response: Response) -> Result<T, EcCubeError>
where
    T: DeserializeOwned,
{
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<unavailable>"));
        return Err(EcCubeError::Status { status, body });
    }

    Ok(response.json().await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn client(server: &MockServer) -> EcCubeClient {
        EcCubeClient::new(
            Url::parse(&server.url("/api")).expect("url"),
            Client::builder().build().expect("client"),
        )
    }

    #[test]
    fn query_requests_exactly_the_customer_fields() {
        let query = customer_query(CustomerId::new(42));
        assert!(query.contains("customer(id: 42)"));
        for field in CUSTOMER_FIELDS {
            assert!(query.lines().any(|line| line.trim() == field), "{field}");
        }
        let selected: Vec<&str> = query
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.contains('{') && !line.contains('}'))
            .collect();
        assert_eq!(selected, CUSTOMER_FIELDS);
    }

    #[tokio::test]
    async fn fetch_customer_parses_record() {
        let server = MockServer::start_async().await;
        let client = client(&server);

        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api")
                    .header("Authorization", "Bearer ec-token")
                    .body_contains("customer(id: 42)");
                then.status(200).json_body(json!({
                    "data": {
                        "customer": {
                            "id": "42",
                            "name01": "Tanaka",
                            "name02": "Taro",
                            "email": "t@example.com",
                            "company_name": "Acme",
                            "phone_number": "000"
                        }
                    }
                }));
            })
            .await;

        let record = client
            .fetch_customer(&AccessToken::new("ec-token"), CustomerId::new(42))
            .await
            .expect("fetch")
            .expect("customer present");
        mock.assert_async().await;

        assert_eq!(record.id, CustomerId::new(42));
        assert_eq!(record.name01.as_deref(), Some("Tanaka"));
        assert_eq!(record.phone_number.as_deref(), Some("000"));
    }

    #[tokio::test]
    async fn null_customer_is_none() {
        let server = MockServer::start_async().await;
        let client = client(&server);

        server
            .mock_async(|when, then| {
                when.method(POST).path("/api");
                then.status(200)
                    .json_body(json!({ "data": { "customer": null } }));
            })
            .await;

        let record = client
            .fetch_customer(&AccessToken::new("t"), CustomerId::new(1))
            .await
            .expect("fetch");
        assert_eq!(record, None);
    }

    #[tokio::test]
    async fn graphql_errors_are_reported() {
        let server = MockServer::start_async().await;
        let client = client(&server);

        server
            .mock_async(|when, then| {
                when.method(POST).path("/api");
                then.status(200).json_body(json!({
                    "data": null,
                    "errors": [{ "message": "Customer not readable" }]
                }));
            })
            .await;

        let err = client
            .fetch_customer(&AccessToken::new("t"), CustomerId::new(1))
            .await
            .expect_err("should error");
        match &err {
            EcCubeError::GraphQl(messages) => {
                assert_eq!(messages, &vec!["Customer not readable".to_string()]);
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn error_status_returns_message() {
        let server = MockServer::start_async().await;
        let client = client(&server);

        server
            .mock_async(|when, then| {
                when.method(POST).path("/api");
                then.status(401).body("unauthorized");
            })
            .await;

        let err = client
            .fetch_customer(&AccessToken::new("t"), CustomerId::new(1))
            .await
            .expect_err("should error");
        match &err {
            EcCubeError::Status { status, body } => {
                assert_eq!(*status, StatusCode::UNAUTHORIZED);
                assert_eq!(body, "unauthorized");
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(!err.is_retryable());
    }

    #[test]
    fn server_errors_are_retryable() {
        let err = EcCubeError::Status {
            status: StatusCode::BAD_GATEWAY,
            body: String::new(),
        };
        assert!(err.is_retryable());
    }
}
