use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use dashmap::DashMap;
use tokio::sync::{Mutex, RwLock, broadcast};
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, info, warn};

use crate::error::{ClassifiedError, StoreError, classify};
use crate::gateway::DeliveryGateway;
use crate::geo::haversine_km;
use crate::models::courier::{AuthUser, CourierProfile, GeoPoint, ProfileUpdate, UserRole};
use crate::models::delivery::{Delivery, DeliveryStatus};
use crate::models::statistics::{CourierStatistics, Earnings};

/// State-change notifications for UI consumers.
#[derive(Debug, Clone)]
pub enum StoreEvent {
    ActiveDeliveryChanged(Option<Delivery>),
    DeliveryCompleted(Delivery),
    OnlineStatusChanged(bool),
}

/// Holds the courier's full runtime state and exposes one method per async
/// interaction with the delivery gateway. The store is the only writer of
/// its own fields; UI collaborators read snapshots and subscribe to events.
///
/// Loading is tracked with an in-flight counter rather than a boolean so
/// overlapping operations cannot clear each other's loading state, and every
/// operation captures a generation number before awaiting the gateway:
/// `reset` bumps the generation, and completions from an older generation
/// discard their mutation instead of resurrecting stale state. Completions
/// commit under a single lock shared with `reset` and re-check the captured
/// generation inside it, so a reset cannot slip in between the freshness
/// check and the state write.
pub struct CourierStore {
    gateway: Arc<dyn DeliveryGateway>,
    auth_user: RwLock<Option<AuthUser>>,
    profile: RwLock<Option<CourierProfile>>,
    available: DashMap<String, Delivery>,
    active: RwLock<Option<Delivery>>,
    history: RwLock<Vec<Delivery>>,
    statistics: RwLock<Option<CourierStatistics>>,
    earnings: RwLock<Option<Earnings>>,
    position: RwLock<Option<GeoPoint>>,
    online: AtomicBool,
    last_error: RwLock<Option<StoreError>>,
    in_flight: AtomicUsize,
    generation: AtomicU64,
    /// Serializes completion commits with `reset`; held only for the
    /// synchronous settle, never across a gateway call.
    commit: Mutex<()>,
    events_tx: broadcast::Sender<StoreEvent>,
}

impl CourierStore {
    pub fn new(gateway: Arc<dyn DeliveryGateway>, event_buffer_size: usize) -> Self {
        let (events_tx, _unused_rx) = broadcast::channel(event_buffer_size);

        Self {
            gateway,
            auth_user: RwLock::new(None),
            profile: RwLock::new(None),
            available: DashMap::new(),
            active: RwLock::new(None),
            history: RwLock::new(Vec::new()),
            statistics: RwLock::new(None),
            earnings: RwLock::new(None),
            position: RwLock::new(None),
            online: AtomicBool::new(false),
            last_error: RwLock::new(None),
            in_flight: AtomicUsize::new(0),
            generation: AtomicU64::new(0),
            commit: Mutex::new(()),
            events_tx,
        }
    }

    // ---- operations ----

    pub async fn fetch_profile(&self) -> Result<CourierProfile, StoreError> {
        let _guard = LoadingGuard::new(&self.in_flight);
        *self.last_error.write().await = None;

        let generation = self.generation();
        let outcome = self.gateway.get_profile().await;
        let _commit = self.commit.lock().await;
        self.ensure_fresh(generation)?;

        match outcome {
            Ok(profile) => {
                *self.profile.write().await = Some(profile.clone());
                Ok(profile)
            }
            Err(err) => Err(self
                .record_error(StoreError::Operation(
                    err.detail_or("failed to fetch courier profile"),
                ))
                .await),
        }
    }

    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<CourierProfile, StoreError> {
        let _guard = LoadingGuard::new(&self.in_flight);

        let generation = self.generation();
        let outcome = self.gateway.update_profile(update).await;
        let _commit = self.commit.lock().await;
        self.ensure_fresh(generation)?;

        match outcome {
            // The server answer is authoritative; no client-side merge.
            Ok(profile) => {
                *self.profile.write().await = Some(profile.clone());
                Ok(profile)
            }
            Err(err) => Err(self
                .record_error(StoreError::Operation(
                    err.detail_or("failed to update courier profile"),
                ))
                .await),
        }
    }

    /// Fetches the assignable listing, replacing it wholesale. Runs the
    /// eligibility guard first: on a guard failure no gateway call is made
    /// and the classified error is recorded. Gateway failures on this
    /// operation (and only this one) also go through the classifier.
    pub async fn fetch_available_deliveries(&self) -> Result<Vec<Delivery>, StoreError> {
        let _guard = LoadingGuard::new(&self.in_flight);
        let generation = self.generation();

        if let Err(classified) = self.listing_guard().await {
            let _commit = self.commit.lock().await;
            self.ensure_fresh(generation)?;
            return Err(self.record_error(StoreError::Classified(classified)).await);
        }

        let outcome = self.gateway.get_available_deliveries().await;
        let _commit = self.commit.lock().await;
        self.ensure_fresh(generation)?;

        match outcome {
            Ok(deliveries) => {
                let kept = self.replace_available(deliveries).await;
                Ok(kept)
            }
            Err(err) => Err(self
                .record_error(StoreError::Classified(classify(err.payload())))
                .await),
        }
    }

    /// Distinct entry point from the guarded listing: no eligibility guard,
    /// and failures surface the raw detail text unclassified.
    pub async fn fetch_nearby_deliveries(
        &self,
        latitude: f64,
        longitude: f64,
        radius_km: Option<f64>,
    ) -> Result<Vec<Delivery>, StoreError> {
        let _guard = LoadingGuard::new(&self.in_flight);

        let generation = self.generation();
        let outcome = self
            .gateway
            .get_nearby_deliveries(latitude, longitude, radius_km)
            .await;
        let _commit = self.commit.lock().await;
        self.ensure_fresh(generation)?;

        match outcome {
            Ok(deliveries) => {
                let kept = self.replace_available(deliveries).await;
                Ok(kept)
            }
            Err(err) => Err(self
                .record_error(StoreError::Operation(
                    err.detail_or("failed to fetch nearby deliveries"),
                ))
                .await),
        }
    }

    pub async fn accept_delivery(&self, id: &str) -> Result<Delivery, StoreError> {
        let _guard = LoadingGuard::new(&self.in_flight);

        let generation = self.generation();
        let outcome = self.gateway.accept_delivery(id).await;
        let _commit = self.commit.lock().await;
        self.ensure_fresh(generation)?;

        match outcome {
            Ok(delivery) => {
                // Removal is keyed on the request id: the server may rewrite
                // fields and the caller only knows the id it asked for.
                self.available.remove(id);
                *self.active.write().await = Some(delivery.clone());
                info!(delivery_id = %delivery.id, "delivery accepted");
                self.emit(StoreEvent::ActiveDeliveryChanged(Some(delivery.clone())));
                Ok(delivery)
            }
            Err(err) => Err(self
                .record_error(StoreError::Operation(
                    err.detail_or("failed to accept delivery"),
                ))
                .await),
        }
    }

    pub async fn reject_delivery(&self, id: &str, reason: Option<&str>) -> Result<(), StoreError> {
        let _guard = LoadingGuard::new(&self.in_flight);

        let generation = self.generation();
        let outcome = self.gateway.reject_delivery(id, reason).await;
        let _commit = self.commit.lock().await;
        self.ensure_fresh(generation)?;

        match outcome {
            Ok(()) => {
                self.available.remove(id);
                info!(delivery_id = %id, "delivery rejected");
                Ok(())
            }
            Err(err) => Err(self
                .record_error(StoreError::Operation(
                    err.detail_or("failed to reject delivery"),
                ))
                .await),
        }
    }

    /// Reports a status change to the gateway and replaces the active
    /// delivery with the server's answer. Reaching `delivered` is the
    /// terminal transition: the delivery is prepended to history and the
    /// active slot is cleared, exactly once.
    pub async fn advance_status(
        &self,
        id: &str,
        status: DeliveryStatus,
    ) -> Result<Delivery, StoreError> {
        let _guard = LoadingGuard::new(&self.in_flight);

        let generation = self.generation();
        let outcome = self.gateway.update_delivery_status(id, status).await;
        let _commit = self.commit.lock().await;
        self.ensure_fresh(generation)?;

        match outcome {
            Ok(delivery) => {
                let mut active = self.active.write().await;

                // The server stays authoritative, but a non-forward status is
                // an inconsistency worth surfacing in the logs.
                if let Some(prev) = active.as_ref() {
                    if prev.id == delivery.id && !delivery.status.is_forward_from(prev.status) {
                        warn!(
                            delivery_id = %delivery.id,
                            from = ?prev.status,
                            to = ?delivery.status,
                            "server reported a non-forward status transition"
                        );
                    }
                }

                if delivery.status == DeliveryStatus::Delivered {
                    *active = None;
                    self.history.write().await.insert(0, delivery.clone());
                    info!(delivery_id = %delivery.id, "delivery completed");
                    self.emit(StoreEvent::ActiveDeliveryChanged(None));
                    self.emit(StoreEvent::DeliveryCompleted(delivery.clone()));
                } else {
                    *active = Some(delivery.clone());
                    self.emit(StoreEvent::ActiveDeliveryChanged(Some(delivery.clone())));
                }

                Ok(delivery)
            }
            Err(err) => Err(self
                .record_error(StoreError::Operation(
                    err.detail_or("failed to update delivery status"),
                ))
                .await),
        }
    }

    /// Fire-and-confirm: on success the stored position is exactly the
    /// submitted coordinates, not a server echo.
    pub async fn update_position(&self, latitude: f64, longitude: f64) -> Result<(), StoreError> {
        let _guard = LoadingGuard::new(&self.in_flight);

        let generation = self.generation();
        let outcome = self.gateway.update_position(latitude, longitude).await;
        let _commit = self.commit.lock().await;
        self.ensure_fresh(generation)?;

        match outcome {
            Ok(()) => {
                *self.position.write().await = Some(GeoPoint {
                    latitude,
                    longitude,
                });
                Ok(())
            }
            Err(err) => Err(self
                .record_error(StoreError::Operation(
                    err.detail_or("failed to update position"),
                ))
                .await),
        }
    }

    pub async fn fetch_statistics(&self) -> Result<CourierStatistics, StoreError> {
        let _guard = LoadingGuard::new(&self.in_flight);

        let generation = self.generation();
        let outcome = self.gateway.get_statistics().await;
        let _commit = self.commit.lock().await;
        self.ensure_fresh(generation)?;

        match outcome {
            Ok(statistics) => {
                *self.statistics.write().await = Some(statistics.clone());
                Ok(statistics)
            }
            Err(err) => Err(self
                .record_error(StoreError::Operation(
                    err.detail_or("failed to fetch statistics"),
                ))
                .await),
        }
    }

    pub async fn fetch_earnings(&self) -> Result<Earnings, StoreError> {
        let _guard = LoadingGuard::new(&self.in_flight);

        let generation = self.generation();
        let outcome = self.gateway.get_earnings().await;
        let _commit = self.commit.lock().await;
        self.ensure_fresh(generation)?;

        match outcome {
            Ok(earnings) => {
                *self.earnings.write().await = Some(earnings.clone());
                Ok(earnings)
            }
            Err(err) => Err(self
                .record_error(StoreError::Operation(
                    err.detail_or("failed to fetch earnings"),
                ))
                .await),
        }
    }

    // ---- local mutators ----

    pub async fn set_auth_user(&self, user: Option<AuthUser>) {
        *self.auth_user.write().await = user;
    }

    pub fn set_online_status(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
        self.emit(StoreEvent::OnlineStatusChanged(online));
    }

    pub async fn clear_active_delivery(&self) {
        *self.active.write().await = None;
        self.emit(StoreEvent::ActiveDeliveryChanged(None));
    }

    pub async fn clear_error(&self) {
        *self.last_error.write().await = None;
    }

    pub async fn clear_profile(&self) {
        *self.profile.write().await = None;
        *self.last_error.write().await = None;
    }

    /// Teardown hook for the consuming scope. Clears every field and bumps
    /// the generation so completions still in flight are discarded.
    pub async fn reset(&self) {
        let _commit = self.commit.lock().await;
        self.generation.fetch_add(1, Ordering::AcqRel);
        *self.auth_user.write().await = None;
        *self.profile.write().await = None;
        self.available.clear();
        *self.active.write().await = None;
        self.history.write().await.clear();
        *self.statistics.write().await = None;
        *self.earnings.write().await = None;
        *self.position.write().await = None;
        self.online.store(false, Ordering::SeqCst);
        *self.last_error.write().await = None;
        debug!("store reset");
    }

    // ---- readers ----

    pub async fn profile(&self) -> Option<CourierProfile> {
        self.profile.read().await.clone()
    }

    /// Snapshot of the assignable set; ordering is not meaningful.
    pub fn available_deliveries(&self) -> Vec<Delivery> {
        self.available
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub async fn active_delivery(&self) -> Option<Delivery> {
        self.active.read().await.clone()
    }

    /// Completed deliveries, most recent first.
    pub async fn history(&self) -> Vec<Delivery> {
        self.history.read().await.clone()
    }

    pub async fn statistics(&self) -> Option<CourierStatistics> {
        self.statistics.read().await.clone()
    }

    pub async fn earnings(&self) -> Option<Earnings> {
        self.earnings.read().await.clone()
    }

    pub async fn current_position(&self) -> Option<GeoPoint> {
        self.position.read().await.clone()
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst) > 0
    }

    pub async fn last_error(&self) -> Option<StoreError> {
        self.last_error.read().await.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events_tx.subscribe()
    }

    pub fn event_stream(&self) -> BroadcastStream<StoreEvent> {
        BroadcastStream::new(self.events_tx.subscribe())
    }

    /// Advisory distance from the last reported position to the active
    /// delivery's pickup point, when both are known.
    pub async fn distance_to_pickup_km(&self) -> Option<f64> {
        let position = (*self.position.read().await)?;
        let active = self.active.read().await;
        let pickup = active.as_ref()?.pickup_address.location?;
        Some(haversine_km(&position, &pickup))
    }

    // ---- internals ----

    /// Local precondition checks for the guarded listing. Role is checked
    /// before profile existence so a wrong-role caller never learns whether
    /// a profile record exists.
    async fn listing_guard(&self) -> Result<(), ClassifiedError> {
        let is_courier = matches!(
            self.auth_user.read().await.as_ref(),
            Some(user) if user.role == UserRole::Courier
        );
        if !is_courier {
            return Err(ClassifiedError::not_livreur());
        }

        if self.profile.read().await.is_none() {
            return Err(ClassifiedError::profile_not_found(None));
        }

        Ok(())
    }

    /// Replaces the assignable set wholesale, dropping entries whose id is
    /// already active or in history. Returns the kept snapshot.
    async fn replace_available(&self, deliveries: Vec<Delivery>) -> Vec<Delivery> {
        let mut excluded: HashSet<String> = self
            .history
            .read()
            .await
            .iter()
            .map(|delivery| delivery.id.clone())
            .collect();
        if let Some(active) = self.active.read().await.as_ref() {
            excluded.insert(active.id.clone());
        }

        self.available.clear();
        let mut kept = Vec::new();
        let mut dropped = 0usize;
        for delivery in deliveries {
            if excluded.contains(&delivery.id) {
                dropped += 1;
                continue;
            }
            self.available.insert(delivery.id.clone(), delivery.clone());
            kept.push(delivery);
        }

        if dropped > 0 {
            debug!(dropped, "dropped listed deliveries already active or completed");
        }
        kept
    }

    fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Must run while holding `commit`, so the check and the writes that
    /// follow it are atomic with respect to `reset`.
    fn ensure_fresh(&self, generation: u64) -> Result<(), StoreError> {
        if self.generation.load(Ordering::Acquire) != generation {
            debug!("discarding completion from a previous store generation");
            return Err(StoreError::Stale);
        }
        Ok(())
    }

    async fn record_error(&self, err: StoreError) -> StoreError {
        *self.last_error.write().await = Some(err.clone());
        err
    }

    fn emit(&self, event: StoreEvent) {
        let _ = self.events_tx.send(event);
    }
}

/// Increments the in-flight counter for an operation's duration; the drop
/// runs on every settle path, success or failure.
struct LoadingGuard<'a> {
    in_flight: &'a AtomicUsize,
}

impl<'a> LoadingGuard<'a> {
    fn new(in_flight: &'a AtomicUsize) -> Self {
        in_flight.fetch_add(1, Ordering::SeqCst);
        Self { in_flight }
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}
