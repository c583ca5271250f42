//! Client management

use std::sync::Arc;
use tracing::{info, instrument};

use core_kernel::{ClientId, UserId};

use crate::client::{Client, ClientDetails};
use crate::error::InvoicingError;
use crate::ports::InvoicingPort;

/// Create, edit, list and delete a user's clients
#[derive(Clone)]
pub struct ClientService {
    port: Arc<dyn InvoicingPort>,
}

impl ClientService {
    pub fn new(port: Arc<dyn InvoicingPort>) -> Self {
        Self { port }
    }

    #[instrument(skip(self, details))]
    pub async fn create_client(&self, user_id: UserId, details: ClientDetails) -> Result<Client, InvoicingError> {
        let client = Client::new(user_id, details)?;
        self.port.insert_client(&client).await?;
        info!(client_id = %client.id, name = %client.name, "Client created");
        Ok(client)
    }

    #[instrument(skip(self, details))]
    pub async fn update_client(
        &self,
        user_id: UserId,
        client_id: ClientId,
        details: ClientDetails,
    ) -> Result<Client, InvoicingError> {
        let mut client = self.port.get_client(user_id, client_id).await?;
        client.apply(details)?;
        self.port.update_client(&client).await?;
        Ok(client)
    }

    pub async fn list_clients(&self, user_id: UserId) -> Result<Vec<Client>, InvoicingError> {
        Ok(self.port.list_clients(user_id).await?)
    }

    /// Deletes a client that has no invoices
    #[instrument(skip(self))]
    pub async fn delete_client(&self, user_id: UserId, client_id: ClientId) -> Result<(), InvoicingError> {
        self.port.delete_client(user_id, client_id).await?;
        info!(%client_id, "Client deleted");
        Ok(())
    }
}
