use anyhow::Result;

/// HTTP-клиент для API baconipsum.com
pub struct BaconIpsumClient {
    client: reqwest::Client,
    endpoint: String,
}

impl BaconIpsumClient {
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    /// Получить абзацы текста. Возвращает тело ответа как есть (JSON-массив строк).
    pub async fn fetch_paragraphs(&self, text_type: &str, paragraphs: u32) -> Result<String> {
        let paragraphs = paragraphs.to_string();
        tracing::debug!(
            "GET {} type={} paras={}",
            self.endpoint,
            text_type,
            paragraphs
        );

        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("type", text_type), ("paras", paragraphs.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Bacon ipsum API returned {}: {}", status, body);
        }

        Ok(response.text().await?)
    }
}
