//! Collaborator interfaces for persistence, plus an in-memory reference
//! implementation.
//!
//! Storage mechanics are external concerns; the pipeline only sees these
//! traits. [`MemoryStore`] implements all of them for embedding and tests.

use crate::issue::{Issue, IssueStatus, ResourceField, ResourceRef};
use crate::profile::{ProfileProvider, SiteProfile};
use crate::record::FixRecord;
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

/// Read and update detected issues
pub trait IssueStore: Send + Sync {
    fn get(&self, issue_id: u64) -> anyhow::Result<Option<Issue>>;
    fn update_status(&self, issue_id: u64, status: IssueStatus) -> anyhow::Result<()>;
}

/// Append-only fix audit log
pub trait RecordStore: Send + Sync {
    fn append(&self, record: FixRecord) -> anyhow::Result<Uuid>;
    fn get(&self, record_id: Uuid) -> anyhow::Result<Option<FixRecord>>;
    fn all(&self) -> anyhow::Result<Vec<FixRecord>>;
}

/// Field-level access to target resources
pub trait ResourceStore: Send + Sync {
    fn read_field(
        &self,
        target: &ResourceRef,
        field: ResourceField,
    ) -> anyhow::Result<Option<String>>;
    fn write_field(
        &self,
        target: &ResourceRef,
        field: ResourceField,
        value: &str,
    ) -> anyhow::Result<()>;
    /// Display title of the resource, used by title-derived fixes
    fn title(&self, target: &ResourceRef) -> anyhow::Result<Option<String>>;
}

#[derive(Debug, Clone, Default)]
struct Resource {
    title: String,
    fields: HashMap<ResourceField, String>,
}

#[derive(Default)]
struct Inner {
    issues: HashMap<u64, Issue>,
    records: Vec<FixRecord>,
    resources: HashMap<u64, Resource>,
    profile: Option<SiteProfile>,
}

/// In-memory implementation of every collaborator interface
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_issue(&self, issue: Issue) {
        self.inner.lock().unwrap().issues.insert(issue.id, issue);
    }

    pub fn insert_resource(&self, post_id: u64, title: impl Into<String>) {
        self.inner.lock().unwrap().resources.insert(
            post_id,
            Resource {
                title: title.into(),
                fields: HashMap::new(),
            },
        );
    }

    pub fn set_field(&self, post_id: u64, field: ResourceField, value: impl Into<String>) {
        if let Some(resource) = self.inner.lock().unwrap().resources.get_mut(&post_id) {
            resource.fields.insert(field, value.into());
        }
    }

    pub fn field(&self, post_id: u64, field: ResourceField) -> Option<String> {
        self.inner
            .lock()
            .unwrap()
            .resources
            .get(&post_id)
            .and_then(|r| r.fields.get(&field).cloned())
    }

    pub fn set_profile(&self, profile: SiteProfile) {
        self.inner.lock().unwrap().profile = Some(profile);
    }
}

impl IssueStore for MemoryStore {
    fn get(&self, issue_id: u64) -> anyhow::Result<Option<Issue>> {
        Ok(self.inner.lock().unwrap().issues.get(&issue_id).cloned())
    }

    fn update_status(&self, issue_id: u64, status: IssueStatus) -> anyhow::Result<()> {
        let mut inner = self.inner.lock().unwrap();
        let issue = inner
            .issues
            .get_mut(&issue_id)
            .ok_or_else(|| anyhow::anyhow!("issue {} not found", issue_id))?;
        issue.status = status;
        Ok(())
    }
}

impl RecordStore for MemoryStore {
    fn append(&self, record: FixRecord) -> anyhow::Result<Uuid> {
        let id = record.id;
        self.inner.lock().unwrap().records.push(record);
        Ok(id)
    }

    fn get(&self, record_id: Uuid) -> anyhow::Result<Option<FixRecord>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .records
            .iter()
            .find(|r| r.id == record_id)
            .cloned())
    }

    fn all(&self) -> anyhow::Result<Vec<FixRecord>> {
        Ok(self.inner.lock().unwrap().records.clone())
    }
}

impl ResourceStore for MemoryStore {
    fn read_field(
        &self,
        target: &ResourceRef,
        field: ResourceField,
    ) -> anyhow::Result<Option<String>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .resources
            .get(&target.post_id)
            .and_then(|r| r.fields.get(&field).cloned()))
    }

    fn write_field(
        &self,
        target: &ResourceRef,
        field: ResourceField,
        value: &str,
    ) -> anyhow::Result<()> {
        let mut inner = self.inner.lock().unwrap();
        let resource = inner
            .resources
            .get_mut(&target.post_id)
            .ok_or_else(|| anyhow::anyhow!("resource {} not found", target))?;
        resource.fields.insert(field, value.to_string());
        Ok(())
    }

    fn title(&self, target: &ResourceRef) -> anyhow::Result<Option<String>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .resources
            .get(&target.post_id)
            .map(|r| r.title.clone()))
    }
}

impl ProfileProvider for MemoryStore {
    fn profile(&self) -> Option<SiteProfile> {
        self.inner.lock().unwrap().profile.clone()
    }
}
