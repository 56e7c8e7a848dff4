//! Ferry kubehub: the object store seam the migration engine talks through,
//! plus its kube-rs implementation and cluster connection.

#![forbid(unsafe_code)]

use std::path::Path;

use anyhow::{Context, Result};
use ferry_core::ResourceType;
use kube::{
    api::{Api, DeleteParams, ListParams, Patch, PatchParams, PostParams},
    config::{KubeConfigOptions, Kubeconfig},
    core::DynamicObject,
    Client, Config,
};
use tracing::{debug, info};

const FIELD_MANAGER: &str = "ferry";

/// Failure of a single object store call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("not found")]
    NotFound,
    #[error("already exists")]
    AlreadyExists,
    /// Transport or authentication failure; nothing further will succeed.
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("rejected ({code}): {message}")]
    Rejected { code: u16, message: String },
    #[error("{0}")]
    Other(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool { matches!(self, StoreError::NotFound) }
}

impl From<kube::Error> for StoreError {
    fn from(e: kube::Error) -> Self {
        match e {
            kube::Error::Api(ae) => match ae.code {
                404 => StoreError::NotFound,
                409 if ae.reason == "AlreadyExists" => StoreError::AlreadyExists,
                401 | 403 => StoreError::Unavailable(ae.message),
                code => StoreError::Rejected { code, message: ae.message },
            },
            kube::Error::SerdeError(e) => StoreError::Other(format!("serde: {}", e)),
            other => StoreError::Unavailable(other.to_string()),
        }
    }
}

/// Generic object store capability. Objects travel untyped; callers decode
/// them with `ferry_core::decode`.
#[async_trait::async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get(&self, rt: &ResourceType, namespace: Option<&str>, name: &str) -> Result<DynamicObject, StoreError>;

    /// List objects of a kind, optionally narrowed to a namespace and an
    /// equality label selector (`k=v[,k2=v2]`).
    async fn list(&self, rt: &ResourceType, namespace: Option<&str>, label_selector: Option<&str>) -> Result<Vec<DynamicObject>, StoreError>;

    async fn create(&self, rt: &ResourceType, obj: &DynamicObject) -> Result<(), StoreError>;

    /// RFC 7386 JSON merge patch; only the fields present in `patch` change.
    async fn merge_patch(&self, rt: &ResourceType, namespace: Option<&str>, name: &str, patch: &serde_json::Value) -> Result<(), StoreError>;

    /// Replace the stored object with `obj`; fields absent from `obj` are gone afterwards.
    async fn replace(&self, rt: &ResourceType, obj: &DynamicObject) -> Result<(), StoreError>;

    async fn delete(&self, rt: &ResourceType, namespace: Option<&str>, name: &str) -> Result<(), StoreError>;
}

/// Object store backed by a live cluster.
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl KubeStore {
    pub fn new(client: Client) -> Self { Self { client } }

    fn api(&self, rt: &ResourceType, namespace: Option<&str>) -> Result<Api<DynamicObject>, StoreError> {
        let ar = rt.api_resource();
        if !rt.namespaced {
            return Ok(Api::all_with(self.client.clone(), &ar));
        }
        match namespace {
            Some(ns) => Ok(Api::namespaced_with(self.client.clone(), ns, &ar)),
            None => Err(StoreError::Other(format!("namespace required for namespaced kind {}", rt.kind))),
        }
    }
}

#[async_trait::async_trait]
impl ObjectStore for KubeStore {
    async fn get(&self, rt: &ResourceType, namespace: Option<&str>, name: &str) -> Result<DynamicObject, StoreError> {
        let api = self.api(rt, namespace)?;
        Ok(api.get(name).await?)
    }

    async fn list(&self, rt: &ResourceType, namespace: Option<&str>, label_selector: Option<&str>) -> Result<Vec<DynamicObject>, StoreError> {
        let api: Api<DynamicObject> = match namespace {
            Some(_) => self.api(rt, namespace)?,
            None => Api::all_with(self.client.clone(), &rt.api_resource()),
        };
        let mut lp = ListParams::default();
        if let Some(sel) = label_selector { lp = lp.labels(sel); }
        let list = api.list(&lp).await?;
        debug!(gvk = %rt.gvk_key(), ns = ?namespace, count = list.items.len(), "listed");
        Ok(list.items)
    }

    async fn create(&self, rt: &ResourceType, obj: &DynamicObject) -> Result<(), StoreError> {
        let api = self.api(rt, obj.metadata.namespace.as_deref())?;
        let pp = PostParams { field_manager: Some(FIELD_MANAGER.to_string()), ..Default::default() };
        api.create(&pp, obj).await?;
        Ok(())
    }

    async fn merge_patch(&self, rt: &ResourceType, namespace: Option<&str>, name: &str, patch: &serde_json::Value) -> Result<(), StoreError> {
        let api = self.api(rt, namespace)?;
        let pp = PatchParams { field_manager: Some(FIELD_MANAGER.to_string()), ..Default::default() };
        api.patch(name, &pp, &Patch::Merge(patch)).await?;
        Ok(())
    }

    async fn replace(&self, rt: &ResourceType, obj: &DynamicObject) -> Result<(), StoreError> {
        let name = obj.metadata.name.clone().ok_or_else(|| StoreError::Other("missing metadata.name".into()))?;
        let api = self.api(rt, obj.metadata.namespace.as_deref())?;
        // PUT requires the live resourceVersion.
        let current = api.get(&name).await?;
        let mut next = obj.clone();
        next.metadata.resource_version = current.metadata.resource_version;
        let pp = PostParams { field_manager: Some(FIELD_MANAGER.to_string()), ..Default::default() };
        api.replace(&name, &pp, &next).await?;
        debug!(gvk = %rt.gvk_key(), name = %name, "replaced");
        Ok(())
    }

    async fn delete(&self, rt: &ResourceType, namespace: Option<&str>, name: &str) -> Result<(), StoreError> {
        let api = self.api(rt, namespace)?;
        api.delete(name, &DeleteParams::default()).await?;
        Ok(())
    }
}

/// Build a client from an explicit kubeconfig path and/or context, falling back
/// to the usual inference (`KUBECONFIG`, `~/.kube/config`, in-cluster).
pub async fn connect(kubeconfig: Option<&Path>, context: Option<&str>) -> Result<Client> {
    let options = KubeConfigOptions { context: context.map(|s| s.to_string()), ..Default::default() };
    let config = match (kubeconfig, context) {
        (Some(path), _) => {
            let kc = Kubeconfig::read_from(path).with_context(|| format!("reading kubeconfig {}", path.display()))?;
            Config::from_custom_kubeconfig(kc, &options).await.context("loading kubeconfig")?
        }
        (None, Some(_)) => Config::from_kubeconfig(&options).await.context("loading kubeconfig context")?,
        (None, None) => Config::infer().await.context("inferring cluster config")?,
    };
    info!(cluster = %config.cluster_url, "connecting");
    Client::try_from(config).context("building kube client")
}
