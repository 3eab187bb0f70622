/// Trait for providing authentication headers
pub trait AuthProvider: Send + Sync {
    fn auth_headers(&self) -> Vec<(String, String)>;
}

/// `Authorization: Bearer <key>` as used by OpenAI-compatible servers
pub struct BearerAuth {
    api_key: String,
}

impl BearerAuth {
    pub fn new(api_key: String) -> Self {
        Self { api_key }
    }
}

impl AuthProvider for BearerAuth {
    fn auth_headers(&self) -> Vec<(String, String)> {
        vec![(
            "Authorization".to_string(),
            format!("Bearer {}", self.api_key),
        )]
    }
}

/// Key in a custom header, plus fixed companion headers such as a protocol version
pub struct ApiKeyHeaderAuth {
    header: String,
    api_key: String,
    extra_headers: Vec<(String, String)>,
}

impl ApiKeyHeaderAuth {
    pub fn new(header: impl Into<String>, api_key: String) -> Self {
        Self {
            header: header.into(),
            api_key,
            extra_headers: Vec::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_headers.push((name.into(), value.into()));
        self
    }
}

impl AuthProvider for ApiKeyHeaderAuth {
    fn auth_headers(&self) -> Vec<(String, String)> {
        let mut headers = vec![(self.header.clone(), self.api_key.clone())];
        headers.extend(self.extra_headers.iter().cloned());
        headers
    }
}

/// No authentication at all (local servers)
pub struct NoAuth;

impl AuthProvider for NoAuth {
    fn auth_headers(&self) -> Vec<(String, String)> {
        Vec::new()
    }
}
