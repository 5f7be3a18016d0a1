//! SQLite-backed gateways: thin adapters from the gateway traits onto the
//! `caixa-db` repositories.

use std::collections::HashMap;

use async_trait::async_trait;
use uuid::Uuid;

use caixa_core::returns::{ReturnDraft, ReturnRecord};
use caixa_core::till::TillClosing;
use caixa_core::{
    CashMovement, CashSession, CatalogFilter, CatalogItem, Customer, NewCustomer, Order,
    OrderDraft, Quote, QuoteDraft,
};
use caixa_db::Database;

use super::{CatalogProvider, CustomerDirectory, OrderGateway, TillGateway};
use crate::error::GatewayResult;

#[async_trait]
impl CatalogProvider for Database {
    async fn list_items(
        &self,
        tenant_id: &str,
        filter: &CatalogFilter,
    ) -> GatewayResult<Vec<CatalogItem>> {
        Ok(self.catalog().list(tenant_id, filter).await?)
    }

    async fn find_item(&self, tenant_id: &str, code: &str) -> GatewayResult<Option<CatalogItem>> {
        Ok(self.catalog().find_by_code(tenant_id, code).await?)
    }
}

#[async_trait]
impl CustomerDirectory for Database {
    async fn find_customers(&self, tenant_id: &str, query: &str) -> GatewayResult<Vec<Customer>> {
        Ok(self.customers().search(tenant_id, query).await?)
    }

    async fn create_customer(
        &self,
        tenant_id: &str,
        input: &NewCustomer,
    ) -> GatewayResult<Customer> {
        Ok(self.customers().create(tenant_id, input).await?)
    }
}

#[async_trait]
impl OrderGateway for Database {
    async fn submit_order(&self, draft: &OrderDraft) -> GatewayResult<Order> {
        Ok(self.orders().insert(draft).await?)
    }

    async fn find_order(&self, tenant_id: &str, number: i64) -> GatewayResult<Option<Order>> {
        Ok(self.orders().find_by_number(tenant_id, number).await?)
    }

    async fn find_order_by_key(&self, tenant_id: &str, key: Uuid) -> GatewayResult<Option<Order>> {
        Ok(self.orders().find_by_idempotency_key(tenant_id, key).await?)
    }

    async fn mark_delivered(&self, tenant_id: &str, number: i64) -> GatewayResult<Order> {
        Ok(self.orders().mark_delivered(tenant_id, number).await?)
    }

    async fn save_quote(&self, draft: &QuoteDraft) -> GatewayResult<Quote> {
        Ok(self.quotes().insert(draft).await?)
    }

    async fn find_quote(&self, tenant_id: &str, number: i64) -> GatewayResult<Option<Quote>> {
        Ok(self.quotes().find_by_number(tenant_id, number).await?)
    }

    async fn returned_quantities(&self, order_id: Uuid) -> GatewayResult<HashMap<String, i64>> {
        Ok(self.returns().returned_quantities(order_id).await?)
    }

    async fn submit_return(
        &self,
        draft: &ReturnDraft,
        refund: Option<&CashMovement>,
    ) -> GatewayResult<ReturnRecord> {
        Ok(self.returns().insert(draft, refund).await?)
    }
}

#[async_trait]
impl TillGateway for Database {
    async fn open_session(&self, tenant_id: &str, session: &CashSession) -> GatewayResult<()> {
        Ok(self.till().open(tenant_id, session).await?)
    }

    async fn record_movement(&self, movement: &CashMovement) -> GatewayResult<()> {
        Ok(self.till().record_movement(movement).await?)
    }

    async fn close_session(&self, closing: &TillClosing) -> GatewayResult<()> {
        Ok(self.till().close(closing).await?)
    }

    async fn find_open_session(
        &self,
        tenant_id: &str,
        register_id: &str,
    ) -> GatewayResult<Option<CashSession>> {
        Ok(self.till().find_open(tenant_id, register_id).await?)
    }
}
