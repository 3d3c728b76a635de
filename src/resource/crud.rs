//! CRUD Resources
//!
//! Shorthand for resources over backends that dispatch on `CrudAccess`.

use serde_json::Value;

use super::Resource;
use crate::access::CrudAccess;
use crate::backend::Backend;
use crate::error::Result;
use crate::permission::Principal;
use crate::session::Transaction;

impl<B: Backend<Kind = CrudAccess>> Resource<B> {
    pub async fn create(
        &self,
        name: &str,
        data: Value,
        principals: &[Principal],
        transaction: Option<&mut Transaction>,
    ) -> Result<Value> {
        self.invoke(CrudAccess::Create, name, data, principals, transaction)
            .await
    }

    pub async fn read(
        &self,
        name: &str,
        data: Value,
        principals: &[Principal],
        transaction: Option<&mut Transaction>,
    ) -> Result<Value> {
        self.invoke(CrudAccess::Read, name, data, principals, transaction)
            .await
    }

    pub async fn update(
        &self,
        name: &str,
        data: Value,
        principals: &[Principal],
        transaction: Option<&mut Transaction>,
    ) -> Result<Value> {
        self.invoke(CrudAccess::Update, name, data, principals, transaction)
            .await
    }

    pub async fn delete(
        &self,
        name: &str,
        data: Value,
        principals: &[Principal],
        transaction: Option<&mut Transaction>,
    ) -> Result<Value> {
        self.invoke(CrudAccess::Delete, name, data, principals, transaction)
            .await
    }
}
