//! State that only makes sense while a particular kind of user is signed in.
//!
//! A client browsing a business picks a business and loads its branches; when
//! that client's session ends, both selections must go. The executor only
//! triggers [`RoleScopedStore::clear`]; each store owns its own data.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

#[async_trait]
pub trait RoleScopedStore: Send + Sync {
    fn name(&self) -> &'static str;

    async fn clear(&self);
}

#[derive(Debug)]
pub struct ScopedState<T> {
    name: &'static str,
    value: RwLock<T>,
}

impl<T: Default + Clone + Send + Sync> ScopedState<T> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            value: RwLock::new(T::default()),
        }
    }

    pub async fn get(&self) -> T {
        self.value.read().await.clone()
    }

    pub async fn set(&self, value: T) {
        *self.value.write().await = value;
    }
}

#[async_trait]
impl<T: Default + Clone + Send + Sync> RoleScopedStore for ScopedState<T> {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn clear(&self) {
        *self.value.write().await = T::default();
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusinessSelection {
    pub business_id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    pub id: String,
    pub name: String,
}

/// The business a client is currently browsing.
pub type BusinessContext = ScopedState<Option<BusinessSelection>>;

/// Branches loaded for the selected business.
pub type BranchList = ScopedState<Vec<Branch>>;

pub fn business_context() -> BusinessContext {
    ScopedState::new("business context")
}

pub fn branch_list() -> BranchList {
    ScopedState::new("branch list")
}
