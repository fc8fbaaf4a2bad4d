//! Typed entry points for the supported resources.
//!
//! # Design
//! `PaymentsClient` holds only a `Controller`. Each method encodes its
//! parameters with the codec, wraps the request in an `Operation` naming
//! the response type, and runs it with retry. Every method returns either
//! a fully decoded value or one `ApiError`.

use std::sync::Arc;

use crate::codec::{encode_form, FormEncode, List};
use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::executor::{path_segment, ApiRequest};
use crate::http::{Transport, UreqTransport};
use crate::idempotency::{IdempotencyKey, KeySource, UuidKeySource};
use crate::resilience::{Controller, Operation};
use crate::types::{
    Account, AccountUpdate, Charge, ChargeCreate, Customer, CustomerUpdate, Deleted, Event, ListParams,
};

pub struct PaymentsClient<T, K = UuidKeySource> {
    controller: Controller<T, K>,
}

impl PaymentsClient<UreqTransport, UuidKeySource> {
    /// Client over the bundled `ureq` transport.
    pub fn new(config: ClientConfig) -> Self {
        Self::with_transport(Arc::new(config), UreqTransport::new())
    }
}

impl<T: Transport> PaymentsClient<T, UuidKeySource> {
    pub fn with_transport(config: Arc<ClientConfig>, transport: T) -> Self {
        Self {
            controller: Controller::new(config, transport),
        }
    }
}

impl<T: Transport, K: KeySource> PaymentsClient<T, K> {
    pub fn from_controller(controller: Controller<T, K>) -> Self {
        Self { controller }
    }

    pub fn controller(&self) -> &Controller<T, K> {
        &self.controller
    }

    pub async fn create_charge(&self, params: &ChargeCreate) -> Result<Charge, ApiError> {
        let request = ApiRequest::post_form("/v1/charges", form(params)?);
        self.controller.run_with_retry(&Operation::new(request)).await
    }

    /// `create_charge` under a caller-chosen idempotency key, e.g. an order id.
    pub async fn create_charge_with_key(
        &self,
        params: &ChargeCreate,
        key: IdempotencyKey,
    ) -> Result<Charge, ApiError> {
        let request = ApiRequest::post_form("/v1/charges", form(params)?);
        let operation = Operation::new(request).with_idempotency_key(key);
        self.controller.run_with_retry(&operation).await
    }

    pub async fn retrieve_charge(&self, id: &str) -> Result<Charge, ApiError> {
        let request = ApiRequest::get(format!("/v1/charges/{}", path_segment(id)));
        self.controller.run_with_retry(&Operation::new(request)).await
    }

    pub async fn list_charges(&self, params: &ListParams) -> Result<List<Charge>, ApiError> {
        let request = ApiRequest::get("/v1/charges").with_query(form(params)?);
        self.controller.run_with_retry(&Operation::new(request)).await
    }

    pub async fn retrieve_customer(&self, id: &str) -> Result<Customer, ApiError> {
        let request = ApiRequest::get(format!("/v1/customers/{}", path_segment(id)));
        self.controller.run_with_retry(&Operation::new(request)).await
    }

    pub async fn update_customer(&self, id: &str, params: &CustomerUpdate) -> Result<Customer, ApiError> {
        let request = ApiRequest::post_form(format!("/v1/customers/{}", path_segment(id)), form(params)?);
        self.controller.run_with_retry(&Operation::new(request)).await
    }

    pub async fn delete_customer(&self, id: &str) -> Result<Deleted, ApiError> {
        let request = ApiRequest::delete(format!("/v1/customers/{}", path_segment(id)));
        self.controller.run_with_retry(&Operation::new(request)).await
    }

    pub async fn update_account(&self, id: &str, params: &AccountUpdate) -> Result<Account, ApiError> {
        let request = ApiRequest::post_form(format!("/v1/accounts/{}", path_segment(id)), form(params)?);
        self.controller.run_with_retry(&Operation::new(request)).await
    }

    pub async fn retrieve_event(&self, id: &str) -> Result<Event, ApiError> {
        let request = ApiRequest::get(format!("/v1/events/{}", path_segment(id)));
        self.controller.run_with_retry(&Operation::new(request)).await
    }
}

fn form<P: FormEncode>(params: &P) -> Result<crate::codec::FormParams, ApiError> {
    encode_form(params).map_err(ApiError::Encode)
}
