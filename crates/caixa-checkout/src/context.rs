//! # Session Context
//!
//! Who is working which register for which tenant. Passed to
//! [`crate::Checkout::new`] once; nothing here is process-global.

use caixa_core::{Operator, StoreInfo, DEFAULT_TENANT_ID};

#[derive(Debug, Clone, PartialEq)]
pub struct SessionContext {
    pub tenant_id: String,
    pub register_id: String,
    pub operator: Operator,
    /// Printed on receipt headers.
    pub store: StoreInfo,
}

impl SessionContext {
    pub fn new(
        tenant_id: impl Into<String>,
        register_id: impl Into<String>,
        operator: Operator,
    ) -> Self {
        SessionContext {
            tenant_id: tenant_id.into(),
            register_id: register_id.into(),
            operator,
            store: StoreInfo::default(),
        }
    }

    /// Single-tenant context, mostly for tests and demo mode.
    pub fn single_tenant(register_id: impl Into<String>, operator: Operator) -> Self {
        SessionContext::new(DEFAULT_TENANT_ID, register_id, operator)
    }

    pub fn with_store(mut self, store: StoreInfo) -> Self {
        self.store = store;
        self
    }
}
