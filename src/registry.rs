use std::sync::Arc;

use crate::client::ApiClient;
use crate::error::Result;
use crate::sources::proxy::{GOOGLE_TASKS, MICROSOFT_TODO, TICKTICK, TODOIST};
use crate::sources::{AnySource, NativeSource, ProxySource, Source, TaskSource};

/// Static lookup from a source to its adapter. Adding a provider is one arm
/// here plus one adapter (or profile); the store never changes.
pub fn build_source(source: Source, client: Arc<dyn ApiClient>) -> AnySource {
    match source {
        Source::Native => AnySource::Native(NativeSource::new(client)),
        Source::Todoist => AnySource::Proxy(ProxySource::new(TODOIST, client)),
        Source::TickTick => AnySource::Proxy(ProxySource::new(TICKTICK, client)),
        Source::GoogleTasks => AnySource::Proxy(ProxySource::new(GOOGLE_TASKS, client)),
        Source::MicrosoftToDo => AnySource::Proxy(ProxySource::new(MICROSOFT_TODO, client)),
    }
}

/// Seam through which the store instantiates adapters on source switch.
/// Override in tests to inject scripted sources.
pub trait SourceFactory: Send + Sync + 'static {
    type Source: TaskSource + Send + Sync + 'static;

    fn create(&self, source: Source) -> Result<Self::Source>;
}

/// Factory backed by [`build_source`] and the session's authenticated client.
#[derive(Clone)]
pub struct DefaultSourceFactory {
    client: Arc<dyn ApiClient>,
}

impl DefaultSourceFactory {
    pub fn new(client: Arc<dyn ApiClient>) -> Self {
        Self { client }
    }
}

impl SourceFactory for DefaultSourceFactory {
    type Source = AnySource;

    fn create(&self, source: Source) -> Result<AnySource> {
        Ok(build_source(source, Arc::clone(&self.client)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::MockClient;
    use serde_json::json;

    #[tokio::test]
    async fn test_every_provider_reaches_its_proxy() {
        let cases = [
            (Source::Todoist, "todoist"),
            (Source::TickTick, "ticktick"),
            (Source::GoogleTasks, "googletasks"),
            (Source::MicrosoftToDo, "microsofttodo"),
        ];
        for (source, slug) in cases {
            let client = MockClient::new(vec![Ok(json!([]))]);
            let adapter = build_source(source, client.clone());
            assert!(matches!(adapter, AnySource::Proxy(_)));
            adapter.fetch_tasks(None, None).await.unwrap();
            assert_eq!(client.requests()[0].path, format!("/functions/v1/{slug}/tasks"));
        }
    }

    #[test]
    fn test_native_is_native_adapter() {
        let adapter = build_source(Source::Native, MockClient::new(vec![]));
        assert!(matches!(adapter, AnySource::Native(_)));
        assert!(!adapter.supports_labels());
    }

    #[test]
    fn test_todoist_carries_virtual_list() {
        let adapter = build_source(Source::Todoist, MockClient::new(vec![]));
        assert_eq!(adapter.virtual_list().map(|l| l.id), Some("today".to_string()));
        assert!(adapter.supports_labels());
    }

    #[tokio::test]
    async fn test_default_factory_creates_requested_source() {
        let client = MockClient::new(vec![Ok(json!([]))]);
        let factory = DefaultSourceFactory::new(client.clone());
        let adapter = factory.create(Source::GoogleTasks).unwrap();
        assert!(!adapter.supports_labels());
        adapter.fetch_lists().await.unwrap();
        assert_eq!(client.requests()[0].path, "/functions/v1/googletasks/lists");
    }
}
