use async_trait::async_trait;
use log::{debug, warn};
use std::sync::Arc;

use super::{DocBinStore, FormStore, LocalStore, PostgresStore, Result, StorageError};
use crate::config::{DocBinConfig, PostgresConfig};
use crate::models::{Form, FormResponse};

enum PrimarySelect {
    /// Resolve the remote backend from the environment on every call,
    /// so a deployment gains or loses its remote store without restart.
    FromEnv,
    /// Pinned backends, used by tests.
    Fixed(Option<Arc<dyn FormStore>>),
}

/// Storage façade. Routes each call to the configured remote backend,
/// mirrors successful writes into the local fallback in the background,
/// and retries on the fallback when the remote fails.
///
/// Utility operations (scoring, CSV export, the sharing codec) are not
/// routed through here; they always run locally.
pub struct HybridStore {
    primary: PrimarySelect,
    fallback: Arc<dyn FormStore>,
}

impl HybridStore {
    pub fn from_env() -> Self {
        HybridStore {
            primary: PrimarySelect::FromEnv,
            fallback: Arc::new(LocalStore::new()),
        }
    }

    /// Test constructor with pinned backends.
    pub fn with_backends(
        primary: Option<Arc<dyn FormStore>>,
        fallback: Arc<dyn FormStore>,
    ) -> Self {
        HybridStore {
            primary: PrimarySelect::Fixed(primary),
            fallback,
        }
    }

    fn primary(&self) -> Option<Arc<dyn FormStore>> {
        match &self.primary {
            PrimarySelect::Fixed(primary) => primary.clone(),
            PrimarySelect::FromEnv => {
                if PostgresConfig::from_env().is_configured() {
                    Some(Arc::new(PostgresStore::new()))
                } else if DocBinConfig::from_env().is_configured() {
                    Some(Arc::new(DocBinStore::new()))
                } else {
                    debug!("No remote backend configured, using local fallback");
                    None
                }
            }
        }
    }

    /// Fire-and-forget write-through to the fallback. Never blocks the
    /// caller and never fails the overall operation.
    fn mirror_form(&self, form: Form) {
        let fallback = Arc::clone(&self.fallback);
        tokio::spawn(async move {
            if let Err(e) = fallback.save_form(&form, None).await {
                warn!("Mirror write of form {} failed: {}", form.id, e);
            }
        });
    }

    fn mirror_response(&self, response: FormResponse) {
        let fallback = Arc::clone(&self.fallback);
        tokio::spawn(async move {
            if let Err(e) = fallback.save_response(&response, None).await {
                warn!("Mirror write of response {} failed: {}", response.id, e);
            }
        });
    }

    fn mirror_delete(&self, id: String) {
        let fallback = Arc::clone(&self.fallback);
        tokio::spawn(async move {
            if let Err(e) = fallback.delete_form(&id, None).await {
                debug!("Mirror delete of form {} skipped: {}", id, e);
            }
        });
    }
}

impl Default for HybridStore {
    fn default() -> Self {
        Self::from_env()
    }
}

#[async_trait]
impl FormStore for HybridStore {
    async fn save_form(&self, form: &Form, owner: Option<&str>) -> Result<Form> {
        if let Some(primary) = self.primary() {
            match primary.save_form(form, owner).await {
                Ok(saved) => {
                    self.mirror_form(saved.clone());
                    return Ok(saved);
                }
                Err(e) => warn!("Remote save of form {} failed, using fallback: {}", form.id, e),
            }
        }
        self.fallback.save_form(form, owner).await
    }

    async fn get_form(&self, id: &str) -> Result<Option<Form>> {
        if let Some(primary) = self.primary() {
            match primary.get_form(id).await {
                Ok(found) => {
                    // Keep the offline copy fresh on every remote hit.
                    if let Some(form) = &found {
                        self.mirror_form(form.clone());
                    }
                    return Ok(found);
                }
                Err(e) => warn!("Remote fetch of form {} failed, using fallback: {}", id, e),
            }
        }
        self.fallback.get_form(id).await
    }

    async fn delete_form(&self, id: &str, owner: Option<&str>) -> Result<()> {
        if let Some(primary) = self.primary() {
            match primary.delete_form(id, owner).await {
                Ok(()) => {
                    self.mirror_delete(id.to_string());
                    return Ok(());
                }
                Err(e) => warn!("Remote delete of form {} failed, using fallback: {}", id, e),
            }
        }
        self.fallback.delete_form(id, owner).await
    }

    async fn list_forms(&self, owner: Option<&str>) -> Result<Vec<Form>> {
        if let Some(primary) = self.primary() {
            match primary.list_forms(owner).await {
                Ok(forms) => return Ok(forms),
                Err(e) => warn!("Remote form listing failed, using fallback: {}", e),
            }
        }
        self.fallback.list_forms(owner).await
    }

    async fn save_response(
        &self,
        response: &FormResponse,
        owner: Option<&str>,
    ) -> Result<FormResponse> {
        if let Some(primary) = self.primary() {
            match primary.save_response(response, owner).await {
                Ok(saved) => {
                    self.mirror_response(saved.clone());
                    return Ok(saved);
                }
                Err(e) => warn!(
                    "Remote save of response {} failed, using fallback: {}",
                    response.id, e
                ),
            }
        }
        self.fallback.save_response(response, owner).await
    }

    async fn list_responses(
        &self,
        form_id: Option<&str>,
        owner: Option<&str>,
    ) -> Result<Vec<FormResponse>> {
        if let Some(primary) = self.primary() {
            match primary.list_responses(form_id, owner).await {
                Ok(responses) => return Ok(responses),
                Err(e) => warn!("Remote response listing failed, using fallback: {}", e),
            }
        }
        self.fallback.list_responses(form_id, owner).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Scripted backend that records which operations reached it.
    struct MockStore {
        calls: AtomicUsize,
        form_writes: AtomicUsize,
        response_writes: AtomicUsize,
        fail: Option<fn() -> StorageError>,
    }

    impl MockStore {
        fn working() -> Self {
            MockStore {
                calls: AtomicUsize::new(0),
                form_writes: AtomicUsize::new(0),
                response_writes: AtomicUsize::new(0),
                fail: None,
            }
        }

        fn failing(fail: fn() -> StorageError) -> Self {
            MockStore {
                fail: Some(fail),
                ..Self::working()
            }
        }

        fn touch(&self) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.fail {
                Some(make) => Err(make()),
                None => Ok(()),
            }
        }
    }

    #[async_trait]
    impl FormStore for MockStore {
        async fn save_form(&self, form: &Form, _owner: Option<&str>) -> Result<Form> {
            self.touch()?;
            self.form_writes.fetch_add(1, Ordering::SeqCst);
            Ok(form.clone())
        }

        async fn get_form(&self, _id: &str) -> Result<Option<Form>> {
            self.touch()?;
            Ok(None)
        }

        async fn delete_form(&self, _id: &str, _owner: Option<&str>) -> Result<()> {
            self.touch()
        }

        async fn list_forms(&self, _owner: Option<&str>) -> Result<Vec<Form>> {
            self.touch()?;
            Ok(vec![Form::new("remote form")])
        }

        async fn save_response(
            &self,
            response: &FormResponse,
            _owner: Option<&str>,
        ) -> Result<FormResponse> {
            self.touch()?;
            self.response_writes.fetch_add(1, Ordering::SeqCst);
            Ok(response.clone())
        }

        async fn list_responses(
            &self,
            _form_id: Option<&str>,
            _owner: Option<&str>,
        ) -> Result<Vec<FormResponse>> {
            self.touch()?;
            Ok(Vec::new())
        }
    }

    async fn wait_for(counter: &AtomicUsize, expected: usize) {
        for _ in 0..100 {
            if counter.load(Ordering::SeqCst) >= expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!(
            "mirror write never arrived (saw {})",
            counter.load(Ordering::SeqCst)
        );
    }

    #[tokio::test]
    async fn test_unconfigured_primary_goes_straight_to_fallback() {
        let fallback = Arc::new(MockStore::working());
        let store = HybridStore::with_backends(None, fallback.clone());

        let form = Form::new("fallback only");
        store.save_form(&form, None).await.unwrap();
        store.get_form(&form.id).await.unwrap();
        store.list_forms(None).await.unwrap();

        assert_eq!(fallback.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_failing_primary_retries_on_fallback() {
        let primary = Arc::new(MockStore::failing(|| {
            StorageError::ConnectionFailed("network down".to_string())
        }));
        let fallback = Arc::new(MockStore::working());
        let store = HybridStore::with_backends(Some(primary.clone()), fallback.clone());

        let form = Form::new("degraded save");
        let saved = store.save_form(&form, None).await.unwrap();
        assert_eq!(saved.id, form.id);

        // The primary was attempted once, then the fallback answered.
        assert_eq!(primary.calls.load(Ordering::SeqCst), 1);
        assert_eq!(fallback.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failing_primary_list_returns_fallback_result() {
        let primary = Arc::new(MockStore::failing(|| {
            StorageError::QueryFailed("constraint violation".to_string())
        }));
        let fallback = Arc::new(MockStore::working());
        let store = HybridStore::with_backends(Some(primary), fallback.clone());

        let forms = store.list_forms(None).await.unwrap();
        assert_eq!(forms.len(), 1);
        assert_eq!(fallback.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_successful_primary_write_mirrors_to_fallback() {
        let primary = Arc::new(MockStore::working());
        let fallback = Arc::new(MockStore::working());
        let store = HybridStore::with_backends(Some(primary.clone()), fallback.clone());

        let form = Form::new("mirrored");
        store.save_form(&form, None).await.unwrap();

        assert_eq!(primary.form_writes.load(Ordering::SeqCst), 1);
        // The mirror write is detached; the call above already returned.
        wait_for(&fallback.form_writes, 1).await;
    }

    #[tokio::test]
    async fn test_mirror_failure_does_not_fail_the_caller() {
        let primary = Arc::new(MockStore::working());
        let fallback = Arc::new(MockStore::failing(|| {
            StorageError::Io(std::io::Error::other("disk full"))
        }));
        let store = HybridStore::with_backends(Some(primary.clone()), fallback.clone());

        let mut response = FormResponse::new("form-x");
        response.preliminary_score = Some(5);
        let saved = store.save_response(&response, None).await.unwrap();
        assert_eq!(saved.id, response.id);

        // Give the doomed mirror task a chance to run; the result above
        // must stand regardless.
        wait_for(&fallback.calls, 1).await;
        assert_eq!(primary.response_writes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unsupported_primary_delete_falls_back() {
        let primary = Arc::new(MockStore::failing(|| {
            StorageError::Unsupported("document-bin forms cannot be deleted")
        }));
        let fallback = Arc::new(MockStore::working());
        let store = HybridStore::with_backends(Some(primary.clone()), fallback.clone());

        store.delete_form("abc123xyz", None).await.unwrap();
        assert_eq!(primary.calls.load(Ordering::SeqCst), 1);
        assert_eq!(fallback.calls.load(Ordering::SeqCst), 1);
    }
}
