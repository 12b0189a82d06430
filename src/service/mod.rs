pub mod rental_service;
pub mod sweep_service;

use std::sync::Arc;

use crate::notify::{NotificationDispatcher, PushDelivery};
use crate::payments::PaymentGateway;
use crate::repository::*;

pub use rental_service::{AccessDecision, RentalOrder, RentalService};
pub use sweep_service::{SweepReport, SweepService};

pub struct ServiceContext {
    pub rental_repo: Arc<dyn RentalRepository>,
    pub payment_repo: Arc<dyn PaymentRepository>,
    pub user_repo: Arc<dyn UserRepository>,
    pub movie_repo: Arc<dyn MovieRepository>,
    pub rental_service: Arc<RentalService>,
    pub sweep_service: Arc<SweepService>,
    pub dispatcher: Arc<NotificationDispatcher>,
}

impl ServiceContext {
    pub fn new(
        rental_repo: Arc<dyn RentalRepository>,
        payment_repo: Arc<dyn PaymentRepository>,
        user_repo: Arc<dyn UserRepository>,
        movie_repo: Arc<dyn MovieRepository>,
        gateway: Arc<dyn PaymentGateway>,
        push: Arc<dyn PushDelivery>,
    ) -> Self {
        let dispatcher = Arc::new(NotificationDispatcher::new(
            rental_repo.clone(),
            user_repo.clone(),
            push,
        ));

        let rental_service = Arc::new(RentalService::new(
            rental_repo.clone(),
            payment_repo.clone(),
            user_repo.clone(),
            movie_repo.clone(),
            gateway,
        ));

        let sweep_service = Arc::new(SweepService::new(
            rental_repo.clone(),
            movie_repo.clone(),
            dispatcher.clone(),
        ));

        Self {
            rental_repo,
            payment_repo,
            user_repo,
            movie_repo,
            rental_service,
            sweep_service,
            dispatcher,
        }
    }
}
