//! Integration test harness for the Mediplus client.
//!
//! [`FakeBackend`] is an in-process axum server bound to an ephemeral port
//! that speaks the same REST contract as the real backend: bearer tokens,
//! role checks, the 422 low-stock detail on upload, OTP issuance and pickup,
//! and "404 means empty" listings. Tests drive it through the real
//! `ApiClient`, `SessionContext` and desks.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p mediplus-integration-tests
//! ```
//!
//! # Seeded Data
//!
//! One account per role (see [`email_for`], all with [`PASSWORD`]); the
//! patient has user id [`PATIENT_USER_ID`]. Inventory holds Paracetamol,
//! Amoxicillin, Cough Syrup and a single vial of Insulin.
//!
//! Uploaded "PDFs" are read as text: each `<name> <quantity>` line is a
//! medicine checked against inventory.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::extract::multipart::MultipartError;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post, put};
use axum::{Form, Json, Router};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{NaiveDateTime, NaiveTime, Utc};
use mediplus_client::session::{MemorySessionStore, SessionStore};
use mediplus_client::{ApiClient, ApiError, SessionContext, SessionError};
use mediplus_core::{
    AccountId, DoctorVolume, ExpiredPrescription, FulfillmentStatus, HighVolumeAlert,
    InventoryAnalytics, InventoryItem, InventoryItemId, LowStockItem, Medicine, NewInventoryItem,
    OutOfStockEvent, PeakDay, PharmacyOrder, PharmacyOrderId, PickupTicket, Prescription,
    PrescriptionId, QueueEntry, QueueId, QueueStats, Role, StatusCounts, User, UserId,
};
use rand::Rng;
use secrecy::SecretString;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use url::Url;
use uuid::Uuid;

/// Password of every seeded account.
pub const PASSWORD: &str = "mediplus-pass";

/// `user_id` of the seeded patient.
pub const PATIENT_USER_ID: i32 = 123;

/// Prescriptions in five minutes that raise the high-volume alert.
const HIGH_VOLUME_THRESHOLD: u64 = 10;

/// Seconds of estimated preparation per medicine.
const SECS_PER_MEDICINE: u64 = 120;

const TOKEN_LIFETIME_SECS: i64 = 3600;

/// Email of the seeded account for `role`.
#[must_use]
pub const fn email_for(role: Role) -> &'static str {
    match role {
        Role::Doctor => "doctor@mediplus.test",
        Role::Patient => "patient@mediplus.test",
        Role::Pharmacist => "pharmacist@mediplus.test",
        Role::Admin => "admin@mediplus.test",
    }
}

/// Medicine lines in an uploaded file: `<name> <quantity>` per line. Other
/// lines are ignored.
#[must_use]
pub fn parse_medicines(bytes: &[u8]) -> Vec<(String, i32)> {
    String::from_utf8_lossy(bytes)
        .lines()
        .filter_map(|line| {
            let (name, qty) = line.trim().rsplit_once(char::is_whitespace)?;
            let qty = qty.parse::<i32>().ok().filter(|q| *q > 0)?;
            let name = name.trim();
            (!name.is_empty()).then(|| (name.to_string(), qty))
        })
        .collect()
}

// ============================================================================
// State
// ============================================================================

#[derive(Debug, Clone)]
struct Account {
    id: AccountId,
    user_id: UserId,
    name: String,
    email: String,
    password: String,
    role: Role,
}

impl Account {
    fn user(&self) -> User {
        User {
            id: Some(self.id.clone()),
            user_id: self.user_id,
            name: self.name.clone(),
            email: self.email.clone(),
            role: self.role,
        }
    }
}

#[derive(Debug, Clone)]
struct StoredPrescription {
    record: Prescription,
    file_name: String,
    bytes: Vec<u8>,
    medicines: Vec<(String, i32)>,
}

#[derive(Debug, Clone)]
struct Order {
    id: PharmacyOrderId,
    queue_id: QueueId,
    prescription_id: PrescriptionId,
    patient_user_id: UserId,
    otp: String,
    status: FulfillmentStatus,
    est_time: u64,
    medicines: Vec<Medicine>,
    created_at: NaiveDateTime,
    picked_up_at: Option<NaiveDateTime>,
}

impl Order {
    fn record(&self, with_otp: bool) -> PharmacyOrder {
        PharmacyOrder {
            id: self.id.clone(),
            prescription_id: self.prescription_id.clone(),
            patient_user_id: self.patient_user_id,
            otp_code: with_otp.then(|| self.otp.clone()),
            status: self.status,
            created_at: self.created_at,
        }
    }

    fn entry(&self) -> QueueEntry {
        QueueEntry {
            queue_id: self.queue_id.clone(),
            prescription_id: self.prescription_id.clone(),
            patient_user_id: Some(self.patient_user_id),
            medicines: self.medicines.clone(),
            est_time: self.est_time,
            status: self.status,
            created_at: Some(self.created_at),
        }
    }
}

#[derive(Debug, Default)]
struct Backend {
    accounts: Vec<Account>,
    /// token -> (account index, exp)
    tokens: HashMap<String, (usize, i64)>,
    prescriptions: Vec<StoredPrescription>,
    orders: Vec<Order>,
    inventory: Vec<InventoryItem>,
    usage: HashMap<String, i32>,
    out_of_stock: Vec<OutOfStockEvent>,
    next_user_id: i32,
    next_item_id: i32,
    queue_delay: Duration,
}

impl Backend {
    fn seeded() -> Self {
        let mut backend = Self {
            next_user_id: 300,
            next_item_id: 1,
            ..Self::default()
        };
        for (role, user_id, name) in [
            (Role::Doctor, 101, "Dr. Mehta"),
            (Role::Patient, PATIENT_USER_ID, "Asha Rao"),
            (Role::Pharmacist, 201, "Ravi Kumar"),
            (Role::Admin, 1, "Clinic Admin"),
        ] {
            backend.accounts.push(Account {
                id: AccountId::new(Uuid::new_v4().to_string()),
                user_id: UserId::new(user_id),
                name: name.to_string(),
                email: email_for(role).to_string(),
                password: PASSWORD.to_string(),
                role,
            });
        }
        for (name, quantity, unit) in [
            ("Paracetamol", 100, "tablets"),
            ("Amoxicillin", 40, "capsules"),
            ("Cough Syrup", 20, "bottles"),
            ("Insulin", 1, "vials"),
        ] {
            backend.add_item(&NewInventoryItem::new(name, quantity).with_unit(unit));
        }
        backend
    }

    fn issue_token(&mut self, index: usize, exp: i64) -> String {
        let email = self
            .accounts
            .get(index)
            .map(|a| a.email.clone())
            .unwrap_or_default();
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let claims = URL_SAFE_NO_PAD.encode(json!({"sub": email, "exp": exp}).to_string());
        let signature = URL_SAFE_NO_PAD.encode(Uuid::new_v4().as_bytes());
        let token = format!("{header}.{claims}.{signature}");
        self.tokens.insert(token.clone(), (index, exp));
        token
    }

    fn caller(&self, headers: &HeaderMap, role: Option<Role>) -> Result<Account, Failure> {
        let token = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or_else(Failure::unauthorized)?;
        let (index, exp) = self
            .tokens
            .get(token)
            .copied()
            .ok_or_else(Failure::unauthorized)?;
        if exp <= Utc::now().timestamp() {
            return Err(Failure::unauthorized());
        }
        let account = self
            .accounts
            .get(index)
            .cloned()
            .ok_or_else(Failure::unauthorized)?;
        if let Some(role) = role
            && account.role != role
        {
            return Err(Failure::new(StatusCode::FORBIDDEN, "Not authorized"));
        }
        Ok(account)
    }

    fn item_mut(&mut self, name: &str) -> Option<&mut InventoryItem> {
        self.inventory
            .iter_mut()
            .find(|i| i.medicine_name.eq_ignore_ascii_case(name.trim()))
    }

    fn add_item(&mut self, item: &NewInventoryItem) -> InventoryItem {
        let created = InventoryItem {
            id: InventoryItemId::new(self.next_item_id),
            medicine_name: item.medicine_name.trim().to_string(),
            quantity: item.quantity,
            unit: item.unit.clone(),
            threshold: Some(item.threshold),
            last_updated: Some(Utc::now().naive_utc()),
        };
        self.next_item_id += 1;
        self.inventory.push(created.clone());
        created
    }

    fn low_stock(&self, medicines: &[(String, i32)]) -> Vec<LowStockItem> {
        medicines
            .iter()
            .filter_map(|(name, requested)| {
                let available = self
                    .inventory
                    .iter()
                    .find(|i| i.medicine_name.eq_ignore_ascii_case(name))
                    .map_or(0, |i| i.quantity);
                (available < *requested).then(|| LowStockItem {
                    medicine_name: name.clone(),
                    requested: *requested,
                    available,
                })
            })
            .collect()
    }

    fn prescription(&self, id: &PrescriptionId) -> Result<&StoredPrescription, Failure> {
        self.prescriptions
            .iter()
            .find(|p| &p.record.id == id)
            .ok_or_else(|| Failure::not_found("Prescription not found"))
    }

    fn order_mut(&mut self, id: &PrescriptionId) -> Result<&mut Order, Failure> {
        self.orders
            .iter_mut()
            .find(|o| &o.prescription_id == id)
            .ok_or_else(|| Failure::not_found("Order not found"))
    }

    fn set_status(&mut self, id: &PrescriptionId, status: FulfillmentStatus) {
        if let Some(p) = self.prescriptions.iter_mut().find(|p| &p.record.id == id) {
            p.record.status = status;
        }
    }
}

/// Counters for the queue endpoint.
#[derive(Debug, Default)]
struct QueueTraffic {
    queue_requests: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

struct InFlight<'a>(&'a QueueTraffic);

impl<'a> InFlight<'a> {
    fn enter(traffic: &'a QueueTraffic) -> Self {
        traffic.queue_requests.fetch_add(1, Ordering::SeqCst);
        let now = traffic.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        traffic.max_in_flight.fetch_max(now, Ordering::SeqCst);
        Self(traffic)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Clone)]
struct AppState {
    backend: Arc<Mutex<Backend>>,
    traffic: Arc<QueueTraffic>,
}

// ============================================================================
// Errors
// ============================================================================

/// `{"detail": ...}` error response.
#[derive(Debug)]
struct Failure {
    status: StatusCode,
    detail: Value,
}

impl Failure {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            detail: Value::String(message.into()),
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "Could not validate credentials")
    }
}

impl IntoResponse for Failure {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "detail": self.detail }))).into_response()
    }
}

impl From<MultipartError> for Failure {
    fn from(e: MultipartError) -> Self {
        Self::bad_request(e.body_text())
    }
}

type Reply<T> = Result<Json<T>, Failure>;

fn message(text: &str) -> Json<Value> {
    Json(json!({ "message": text }))
}

// ============================================================================
// Auth
// ============================================================================

#[derive(Deserialize)]
struct TokenForm {
    username: String,
    password: String,
}

async fn token(State(state): State<AppState>, Form(form): Form<TokenForm>) -> Reply<Value> {
    let mut backend = state.backend.lock().await;
    let index = backend
        .accounts
        .iter()
        .position(|a| a.email.eq_ignore_ascii_case(form.username.trim()) && a.password == form.password)
        .ok_or_else(|| Failure::new(StatusCode::UNAUTHORIZED, "Incorrect email or password"))?;
    let exp = Utc::now().timestamp() + TOKEN_LIFETIME_SECS;
    let token = backend.issue_token(index, exp);
    Ok(Json(json!({ "access_token": token, "token_type": "bearer" })))
}

#[derive(Deserialize)]
struct SignupBody {
    name: String,
    email: String,
    password: String,
    role: Role,
}

async fn register(State(state): State<AppState>, Json(body): Json<SignupBody>) -> Reply<User> {
    let mut backend = state.backend.lock().await;
    if backend
        .accounts
        .iter()
        .any(|a| a.email.eq_ignore_ascii_case(&body.email))
    {
        return Err(Failure::bad_request("Email already registered"));
    }
    let account = Account {
        id: AccountId::new(Uuid::new_v4().to_string()),
        user_id: UserId::new(backend.next_user_id),
        name: body.name,
        email: body.email,
        password: body.password,
        role: body.role,
    };
    backend.next_user_id += 1;
    let user = account.user();
    backend.accounts.push(account);
    Ok(Json(user))
}

async fn me(State(state): State<AppState>, headers: HeaderMap) -> Reply<User> {
    let backend = state.backend.lock().await;
    Ok(Json(backend.caller(&headers, None)?.user()))
}

// ============================================================================
// Prescriptions
// ============================================================================

async fn list_prescriptions(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Reply<Vec<Prescription>> {
    let backend = state.backend.lock().await;
    let patient = backend.caller(&headers, Some(Role::Patient))?;
    let own: Vec<Prescription> = backend
        .prescriptions
        .iter()
        .filter(|p| p.record.patient_user_id == patient.user_id)
        .map(|p| p.record.clone())
        .collect();
    if own.is_empty() {
        return Err(Failure::not_found("No prescriptions found"));
    }
    Ok(Json(own))
}

#[derive(Deserialize)]
struct SearchQuery {
    name: Option<String>,
    user_id: Option<i32>,
}

async fn search_prescriptions(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<SearchQuery>,
) -> Reply<Vec<Prescription>> {
    let backend = state.backend.lock().await;
    backend.caller(&headers, Some(Role::Doctor))?;
    let found: Vec<Prescription> = backend
        .prescriptions
        .iter()
        .map(|p| &p.record)
        .filter(|p| {
            query
                .name
                .as_deref()
                .is_none_or(|n| p.patient_name_contains(n))
        })
        .filter(|p| query.user_id.is_none_or(|id| p.patient_user_id.as_i32() == id))
        .cloned()
        .collect();
    Ok(Json(found))
}

#[derive(Default)]
struct UploadForm {
    file_name: String,
    bytes: Vec<u8>,
    patient_name: String,
    patient_user_id: Option<i32>,
    remarks: Option<String>,
}

async fn read_upload(mut multipart: Multipart) -> Result<UploadForm, Failure> {
    let mut form = UploadForm::default();
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                form.file_name = field.file_name().unwrap_or("prescription.pdf").to_string();
                form.bytes = field.bytes().await?.to_vec();
            }
            "patient_name" => form.patient_name = field.text().await?,
            "patient_user_id" => form.patient_user_id = field.text().await?.trim().parse().ok(),
            "remarks" => form.remarks = Some(field.text().await?),
            _ => {}
        }
    }
    Ok(form)
}

async fn create_prescription(
    state: &AppState,
    headers: &HeaderMap,
    multipart: Multipart,
    force: bool,
) -> Reply<Prescription> {
    let form = read_upload(multipart).await?;
    let mut backend = state.backend.lock().await;
    let doctor = backend.caller(headers, Some(Role::Doctor))?;

    if form.bytes.is_empty() {
        return Err(Failure::bad_request("File is required"));
    }
    let patient_name = form.patient_name.trim().to_string();
    if patient_name.is_empty() {
        return Err(Failure::bad_request("patient_name is required"));
    }
    let patient_user_id = form
        .patient_user_id
        .ok_or_else(|| Failure::bad_request("patient_user_id is required"))?;
    if !backend
        .accounts
        .iter()
        .any(|a| a.role == Role::Patient && a.user_id.as_i32() == patient_user_id)
    {
        return Err(Failure::not_found("Patient not found"));
    }

    let medicines = parse_medicines(&form.bytes);
    let low = backend.low_stock(&medicines);
    if !low.is_empty() && !force {
        return Err(Failure {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            detail: json!({
                "message": "Some medicines are low in stock",
                "low_stock": low,
            }),
        });
    }

    let id = PrescriptionId::new(Uuid::new_v4().to_string());
    let now = Utc::now().naive_utc();
    for item in low {
        backend.out_of_stock.push(OutOfStockEvent {
            medicine_name: item.medicine_name,
            prescription_id: id.clone(),
            timestamp: Some(now),
        });
    }

    let record = Prescription {
        id: id.clone(),
        doctor_id: Some(doctor.id.clone()),
        doctor_name: doctor.name.clone(),
        patient_user_id: UserId::new(patient_user_id),
        patient_name,
        file_path: format!("uploads/{id}_{}", form.file_name),
        remarks: form
            .remarks
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty()),
        status: FulfillmentStatus::Pending,
        created_at: now,
    };
    backend.prescriptions.push(StoredPrescription {
        record: record.clone(),
        file_name: form.file_name,
        bytes: form.bytes,
        medicines,
    });
    Ok(Json(record))
}

async fn upload(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Reply<Prescription> {
    create_prescription(&state, &headers, multipart, false).await
}

async fn upload_override(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Reply<Prescription> {
    create_prescription(&state, &headers, multipart, true).await
}

async fn view_prescription(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Response, Failure> {
    let backend = state.backend.lock().await;
    let caller = backend.caller(&headers, None)?;
    let stored = backend.prescription(&PrescriptionId::new(id))?;
    if caller.role == Role::Patient && stored.record.patient_user_id != caller.user_id {
        return Err(Failure::not_found("Prescription not found"));
    }
    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", stored.file_name),
            ),
        ],
        stored.bytes.clone(),
    )
        .into_response())
}

// ============================================================================
// Pharmacy
// ============================================================================

fn medicine_kind(name: &str) -> &'static str {
    let lower = name.to_lowercase();
    if ["syrup", "injection", "insulin"]
        .iter()
        .any(|k| lower.contains(k))
    {
        "edge"
    } else {
        "regular"
    }
}

async fn send_to_pharmacy(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Reply<PickupTicket> {
    let mut backend = state.backend.lock().await;
    let patient = backend.caller(&headers, Some(Role::Patient))?;
    let id = PrescriptionId::new(id);
    let stored = backend.prescription(&id)?.clone();
    if stored.record.patient_user_id != patient.user_id {
        return Err(Failure::not_found("Prescription not found"));
    }
    if backend.orders.iter().any(|o| o.prescription_id == id) {
        return Err(Failure::bad_request("Prescription already sent to pharmacy"));
    }

    for (name, quantity) in &stored.medicines {
        if let Some(item) = backend.item_mut(name) {
            item.quantity = (item.quantity - quantity).max(0);
            item.last_updated = Some(Utc::now().naive_utc());
        }
        *backend.usage.entry(name.to_lowercase()).or_default() += quantity;
    }

    let count = u64::try_from(stored.medicines.len()).unwrap_or(1).max(1);
    let otp = format!("{:06}", rand::rng().random_range(0..1_000_000));
    let order = Order {
        id: PharmacyOrderId::new(Uuid::new_v4().to_string()),
        queue_id: QueueId::new(Uuid::new_v4().to_string()),
        prescription_id: id,
        patient_user_id: patient.user_id,
        otp: otp.clone(),
        status: FulfillmentStatus::Pending,
        est_time: count * SECS_PER_MEDICINE,
        medicines: stored
            .medicines
            .iter()
            .map(|(name, _)| Medicine {
                name: name.clone(),
                kind: Some(medicine_kind(name).to_string()),
            })
            .collect(),
        created_at: Utc::now().naive_utc(),
        picked_up_at: None,
    };
    let est_time = order.est_time;
    backend.orders.push(order);

    Ok(Json(PickupTicket {
        message: "Prescription sent to pharmacy".to_string(),
        otp_code: otp,
        est_time: Some(est_time),
    }))
}

async fn mark_preparing(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Reply<Value> {
    let mut backend = state.backend.lock().await;
    backend.caller(&headers, Some(Role::Pharmacist))?;
    let id = PrescriptionId::new(id);
    let order = backend.order_mut(&id)?;
    if order.status != FulfillmentStatus::Pending {
        return Err(Failure::bad_request(format!(
            "Cannot mark preparing: prescription is {}",
            order.status
        )));
    }
    order.status = FulfillmentStatus::Preparing;
    backend.set_status(&id, FulfillmentStatus::Preparing);
    Ok(message("Marked as preparing"))
}

#[derive(Deserialize)]
struct OtpQuery {
    otp_code: String,
}

async fn confirm_pickup(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Query(query): Query<OtpQuery>,
) -> Reply<Value> {
    let mut backend = state.backend.lock().await;
    backend.caller(&headers, Some(Role::Pharmacist))?;
    let id = PrescriptionId::new(id);
    let order = backend.order_mut(&id)?;
    if order.status == FulfillmentStatus::PickedUp {
        return Err(Failure::bad_request("Prescription already picked up"));
    }
    if order.otp != query.otp_code.trim() {
        return Err(Failure::not_found("Invalid OTP"));
    }
    if order.status != FulfillmentStatus::Preparing {
        return Err(Failure::bad_request("Prescription is not ready for pickup"));
    }
    order.status = FulfillmentStatus::PickedUp;
    order.picked_up_at = Some(Utc::now().naive_utc());
    backend.set_status(&id, FulfillmentStatus::PickedUp);
    Ok(message("Pickup confirmed"))
}

async fn queue(State(state): State<AppState>, headers: HeaderMap) -> Reply<Vec<QueueEntry>> {
    let _guard = InFlight::enter(&state.traffic);
    let delay = {
        let backend = state.backend.lock().await;
        backend.caller(&headers, Some(Role::Pharmacist))?;
        backend.queue_delay
    };
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
    let backend = state.backend.lock().await;
    Ok(Json(backend.orders.iter().map(Order::entry).collect()))
}

async fn orders(State(state): State<AppState>, headers: HeaderMap) -> Reply<Vec<PharmacyOrder>> {
    let backend = state.backend.lock().await;
    backend.caller(&headers, Some(Role::Pharmacist))?;
    Ok(Json(backend.orders.iter().map(|o| o.record(false)).collect()))
}

async fn pending(State(state): State<AppState>, headers: HeaderMap) -> Reply<Vec<PharmacyOrder>> {
    let backend = state.backend.lock().await;
    backend.caller(&headers, Some(Role::Pharmacist))?;
    let pending: Vec<PharmacyOrder> = backend
        .orders
        .iter()
        .filter(|o| o.status == FulfillmentStatus::Pending)
        .map(|o| o.record(true))
        .collect();
    if pending.is_empty() {
        return Err(Failure::not_found("No pending orders"));
    }
    Ok(Json(pending))
}

// ============================================================================
// Inventory
// ============================================================================

async fn list_inventory(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Reply<Vec<InventoryItem>> {
    let backend = state.backend.lock().await;
    backend.caller(&headers, Some(Role::Admin))?;
    Ok(Json(backend.inventory.clone()))
}

async fn add_inventory(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(item): Json<NewInventoryItem>,
) -> Reply<InventoryItem> {
    let mut backend = state.backend.lock().await;
    backend.caller(&headers, Some(Role::Admin))?;
    if item.quantity < 0 {
        return Err(Failure::bad_request("Quantity must not be negative"));
    }
    if backend.item_mut(&item.medicine_name).is_some() {
        return Err(Failure::bad_request("Medicine already exists"));
    }
    Ok(Json(backend.add_item(&item)))
}

#[derive(Deserialize)]
struct QuantityBody {
    quantity: i32,
}

async fn update_inventory(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i32>,
    Json(body): Json<QuantityBody>,
) -> Reply<InventoryItem> {
    let mut backend = state.backend.lock().await;
    backend.caller(&headers, Some(Role::Admin))?;
    if body.quantity < 0 {
        return Err(Failure::bad_request("Quantity must not be negative"));
    }
    let item = backend
        .inventory
        .iter_mut()
        .find(|i| i.id.as_i32() == id)
        .ok_or_else(|| Failure::not_found("Item not found"))?;
    item.quantity = body.quantity;
    item.last_updated = Some(Utc::now().naive_utc());
    Ok(Json(item.clone()))
}

async fn delete_inventory(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i32>,
) -> Reply<Value> {
    let mut backend = state.backend.lock().await;
    backend.caller(&headers, Some(Role::Admin))?;
    let before = backend.inventory.len();
    backend.inventory.retain(|i| i.id.as_i32() != id);
    if backend.inventory.len() == before {
        return Err(Failure::not_found("Item not found"));
    }
    Ok(message("Item deleted"))
}

async fn upload_csv(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Reply<Value> {
    let mut csv = Vec::new();
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some("file") {
            csv = field.bytes().await?.to_vec();
        }
    }

    let mut backend = state.backend.lock().await;
    backend.caller(&headers, Some(Role::Admin))?;

    let mut imported = 0;
    for line in String::from_utf8_lossy(&csv).lines() {
        let mut cols = line.split(',').map(str::trim);
        let (Some(name), Some(qty)) = (cols.next(), cols.next()) else {
            continue;
        };
        let Ok(quantity) = qty.parse::<i32>() else {
            continue;
        };
        if name.is_empty() || quantity < 0 {
            continue;
        }
        let unit = cols
            .next()
            .filter(|u| !u.is_empty())
            .unwrap_or(InventoryItem::DEFAULT_UNIT)
            .to_string();
        if let Some(item) = backend.item_mut(name) {
            item.quantity += quantity;
            item.last_updated = Some(Utc::now().naive_utc());
        } else {
            backend.add_item(&NewInventoryItem::new(name, quantity).with_unit(unit));
        }
        imported += 1;
    }
    Ok(message(&format!("Imported {imported} rows")))
}

// ============================================================================
// Analytics and alerts
// ============================================================================

async fn inventory_analytics(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Reply<Vec<InventoryAnalytics>> {
    let backend = state.backend.lock().await;
    backend.caller(&headers, Some(Role::Admin))?;
    Ok(Json(
        backend
            .inventory
            .iter()
            .map(|i| InventoryAnalytics {
                id: i.id.as_i32(),
                medicine_name: i.medicine_name.clone(),
                quantity_used: backend.usage.get(&i.medicine_name.to_lowercase()).copied(),
                quantity_remaining: Some(i.quantity),
                restock_alert: i.needs_restock().then(|| "Restock needed".to_string()),
                created_at: i.last_updated,
            })
            .collect(),
    ))
}

async fn prescriptions_by_doctor(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Reply<Vec<DoctorVolume>> {
    let backend = state.backend.lock().await;
    backend.caller(&headers, Some(Role::Admin))?;
    let mut volumes: Vec<DoctorVolume> = Vec::new();
    for p in &backend.prescriptions {
        match volumes
            .iter_mut()
            .find(|v| v.doctor_name == p.record.doctor_name)
        {
            Some(v) => v.total_uploaded += 1,
            None => volumes.push(DoctorVolume {
                doctor_name: p.record.doctor_name.clone(),
                total_uploaded: 1,
            }),
        }
    }
    Ok(Json(volumes))
}

async fn peak_day(State(state): State<AppState>, headers: HeaderMap) -> Reply<Vec<PeakDay>> {
    let backend = state.backend.lock().await;
    backend.caller(&headers, Some(Role::Admin))?;
    let mut days: Vec<PeakDay> = Vec::new();
    for p in &backend.prescriptions {
        let day = p.record.created_at.format("%Y-%m-%d").to_string();
        match days.iter_mut().find(|d| d.day == day) {
            Some(d) => d.count += 1,
            None => days.push(PeakDay { day, count: 1 }),
        }
    }
    days.sort_by(|a, b| b.count.cmp(&a.count));
    Ok(Json(days))
}

#[derive(Deserialize)]
struct Window {
    start_date: Option<String>,
    end_date: Option<String>,
}

fn parse_bound(value: Option<&str>, default: NaiveDateTime) -> Result<NaiveDateTime, Failure> {
    value.map_or(Ok(default), |v| {
        NaiveDateTime::parse_from_str(v, "%Y-%m-%dT%H:%M:%S")
            .map_err(|e| Failure::bad_request(format!("Invalid date {v}: {e}")))
    })
}

#[allow(clippy::cast_precision_loss)]
async fn queue_stats(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(window): Query<Window>,
) -> Reply<QueueStats> {
    let backend = state.backend.lock().await;
    backend.caller(&headers, Some(Role::Admin))?;

    let now = Utc::now().naive_utc();
    let from = parse_bound(window.start_date.as_deref(), now.date().and_time(NaiveTime::MIN))?;
    let to = parse_bound(window.end_date.as_deref(), now)?;

    let in_window: Vec<&Order> = backend
        .orders
        .iter()
        .filter(|o| o.created_at >= from && o.created_at <= to)
        .collect();
    let count = |status| in_window.iter().filter(|o| o.status == status).count() as u64;
    let waits: Vec<i64> = in_window
        .iter()
        .filter_map(|o| o.picked_up_at.map(|t| (t - o.created_at).num_seconds()))
        .collect();
    let avg_wait_time_sec = if waits.is_empty() {
        0.0
    } else {
        waits.iter().sum::<i64>() as f64 / waits.len() as f64
    };

    Ok(Json(QueueStats {
        from,
        to,
        total_pharmacy_prescriptions: in_window.len() as u64,
        status_counts: StatusCounts {
            pending: count(FulfillmentStatus::Pending),
            preparing: count(FulfillmentStatus::Preparing),
            picked_up: count(FulfillmentStatus::PickedUp),
        },
        current_queue_length: backend
            .orders
            .iter()
            .filter(|o| o.status != FulfillmentStatus::PickedUp)
            .count() as u64,
        avg_wait_time_sec,
    }))
}

async fn out_of_stock(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Reply<Vec<OutOfStockEvent>> {
    let backend = state.backend.lock().await;
    backend.caller(&headers, Some(Role::Admin))?;
    Ok(Json(backend.out_of_stock.clone()))
}

async fn expired_prescriptions(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Reply<Vec<ExpiredPrescription>> {
    let backend = state.backend.lock().await;
    backend.caller(&headers, Some(Role::Admin))?;
    let cutoff = Utc::now().naive_utc() - chrono::Duration::hours(48);
    Ok(Json(
        backend
            .orders
            .iter()
            .filter(|o| o.status != FulfillmentStatus::PickedUp && o.created_at < cutoff)
            .map(|o| ExpiredPrescription {
                prescription_id: o.prescription_id.clone(),
                status: o.status,
                created_at: Some(o.created_at),
            })
            .collect(),
    ))
}

async fn high_volume(State(state): State<AppState>, headers: HeaderMap) -> Reply<HighVolumeAlert> {
    let backend = state.backend.lock().await;
    backend.caller(&headers, Some(Role::Admin))?;
    let since = Utc::now().naive_utc() - chrono::Duration::minutes(5);
    let recent = backend
        .prescriptions
        .iter()
        .filter(|p| p.record.created_at >= since)
        .count() as u64;
    Ok(Json(HighVolumeAlert {
        prescriptions_last_5_min: recent,
        threshold_exceeded: recent >= HIGH_VOLUME_THRESHOLD,
    }))
}

// ============================================================================
// Chatbot
// ============================================================================

#[derive(Deserialize)]
struct PromptBody {
    prompt: String,
}

async fn ask(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<PromptBody>,
) -> Reply<Value> {
    let backend = state.backend.lock().await;
    backend.caller(&headers, Some(Role::Patient))?;
    if body.prompt.trim().is_empty() {
        return Err(Failure::bad_request("Prompt is required"));
    }
    Ok(Json(json!({
        "response": format!("Please follow your doctor's advice regarding: {}", body.prompt.trim())
    })))
}

async fn suggest_questions(State(state): State<AppState>, headers: HeaderMap) -> Reply<Value> {
    let backend = state.backend.lock().await;
    backend.caller(&headers, Some(Role::Patient))?;
    Ok(Json(json!({
        "questions": "1. Should I take this with food?\n2. What side effects should I watch for?\n3. When should I come back for a follow-up?"
    })))
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/auth/token", post(token))
        .route("/auth/", post(register))
        .route("/auth/me", get(me))
        .route("/prescriptions/", get(list_prescriptions).post(upload))
        .route("/prescriptions", get(search_prescriptions))
        .route("/prescriptions/override", post(upload_override))
        .route("/prescriptions/view/{id}", get(view_prescription))
        .route("/pharmacy/send/{id}", post(send_to_pharmacy))
        .route("/pharmacy/mark-preparing/{id}", post(mark_preparing))
        .route("/pharmacy/confirm-pickup/{id}", post(confirm_pickup))
        .route("/pharmacy/list", get(queue))
        .route("/pharmacy/orders", get(orders))
        .route("/pharmacy/pending", get(pending))
        .route("/admin/inventory/", get(list_inventory))
        .route("/admin/inventory/add", post(add_inventory))
        .route("/admin/inventory/update/{id}", put(update_inventory))
        .route("/admin/inventory/delete/{id}", delete(delete_inventory))
        .route("/admin/inventory/upload-csv", post(upload_csv))
        .route("/analytics/inventory", get(inventory_analytics))
        .route(
            "/analytics/prescriptions-by-doctor",
            get(prescriptions_by_doctor),
        )
        .route("/analytics/peak-day", get(peak_day))
        .route("/dashboard/queue_stats", get(queue_stats))
        .route("/alerts/out-of-stock", get(out_of_stock))
        .route("/alerts/expired-prescriptions", get(expired_prescriptions))
        .route("/alerts/high-volume", get(high_volume))
        .route("/chatbot/ask", post(ask))
        .route("/chatbot/suggest_questions", post(suggest_questions))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ============================================================================
// Harness
// ============================================================================

/// A running fake backend. The server stops when this is dropped.
pub struct FakeBackend {
    base_url: Url,
    state: AppState,
    server: JoinHandle<()>,
}

impl FakeBackend {
    /// Bind to an ephemeral local port and start serving.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener cannot be bound.
    pub async fn start() -> std::io::Result<Self> {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr: SocketAddr = listener.local_addr()?;
        let base_url = Url::parse(&format!("http://{addr}/")).map_err(std::io::Error::other)?;

        let state = AppState {
            backend: Arc::new(Mutex::new(Backend::seeded())),
            traffic: Arc::default(),
        };
        let app = router(state.clone());
        let server = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!(error = %e, "fake backend stopped");
            }
        });

        Ok(Self {
            base_url,
            state,
            server,
        })
    }

    #[must_use]
    pub const fn url(&self) -> &Url {
        &self.base_url
    }

    /// A gateway pointed at this backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn api(&self) -> Result<ApiClient, ApiError> {
        ApiClient::with_base_url(self.base_url.clone(), Duration::from_secs(5))
    }

    /// A signed-out session backed by memory.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn session(&self) -> Result<SessionContext, ApiError> {
        self.session_with(MemorySessionStore::new())
    }

    /// A signed-out session backed by `store`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn session_with(
        &self,
        store: impl SessionStore + 'static,
    ) -> Result<SessionContext, ApiError> {
        Ok(SessionContext::new(self.api()?, store))
    }

    /// A session signed in as the seeded account for `role`.
    ///
    /// # Errors
    ///
    /// Returns an error if login fails.
    pub async fn signed_in(&self, role: Role) -> Result<SessionContext, SessionError> {
        let session = self.session()?;
        session
            .login(email_for(role), &SecretString::from(PASSWORD))
            .await?;
        Ok(session)
    }

    /// Issue a token for the seeded `role` account with an explicit expiry.
    pub async fn issue_token(&self, role: Role, exp: i64) -> String {
        let mut backend = self.state.backend.lock().await;
        let index = backend
            .accounts
            .iter()
            .position(|a| a.email == email_for(role))
            .unwrap_or_default();
        backend.issue_token(index, exp)
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    pub async fn prescription_count(&self) -> usize {
        self.state.backend.lock().await.prescriptions.len()
    }

    pub async fn prescription_status(&self, id: &PrescriptionId) -> Option<FulfillmentStatus> {
        let backend = self.state.backend.lock().await;
        backend
            .prescriptions
            .iter()
            .find(|p| &p.record.id == id)
            .map(|p| p.record.status)
    }

    pub async fn stock(&self, medicine: &str) -> Option<i32> {
        let backend = self.state.backend.lock().await;
        backend
            .inventory
            .iter()
            .find(|i| i.medicine_name.eq_ignore_ascii_case(medicine))
            .map(|i| i.quantity)
    }

    /// Make every queue request take at least `delay`.
    pub async fn set_queue_delay(&self, delay: Duration) {
        self.state.backend.lock().await.queue_delay = delay;
    }

    #[must_use]
    pub fn queue_requests(&self) -> usize {
        self.state.traffic.queue_requests.load(Ordering::SeqCst)
    }

    /// Highest number of queue requests ever served at once.
    #[must_use]
    pub fn max_queue_in_flight(&self) -> usize {
        self.state.traffic.max_in_flight.load(Ordering::SeqCst)
    }
}

impl Drop for FakeBackend {
    fn drop(&mut self) {
        self.server.abort();
    }
}
