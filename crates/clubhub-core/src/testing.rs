//! In-memory backend used by the unit tests.
//!
//! Serves a tiny club service (clubs, memberships, events, tasks,
//! attendance, announcements, one signed-in user) and lets tests script
//! delayed responses for a path to exercise ordering.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::StatusCode;
use serde_json::{json, Value};

use crate::api::{ApiError, Backend, Method};
use crate::models::{Club, MemberRole, Membership, MembershipStatus};

pub const FAKE_TOKEN: &str = "tok-ana";
pub const FAKE_PASSWORD: &str = "correct horse";

/// Address the mail endpoints refuse with a 422.
pub const BOUNCING_EMAIL: &str = "bounce@example.edu";

/// The signed-in user.
pub const ANA: i64 = 1;
/// Another student, with a pending request in the chess club.
pub const BEN: i64 = 2;
/// Approved member of the chess club.
pub const CARA: i64 = 3;

pub const CHESS: i64 = 10;
pub const ROBOTICS: i64 = 11;
pub const SOCCER: i64 = 12;

/// Chess club event, with Ana marked present.
pub const OPENING_NIGHT: i64 = 100;
/// Open chess club task.
pub const BOARD_INVENTORY: i64 = 200;

struct Scripted {
    delay: Duration,
    body: Value,
}

#[derive(Default)]
struct State {
    clubs: Vec<(Club, &'static str)>,
    memberships: Vec<Membership>,
    events: Vec<Value>,
    tasks: Vec<Value>,
    attendance: Vec<Value>,
    announcements: Vec<Value>,
    next_id: i64,
}

impl State {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn has_club(&self, club_id: i64) -> Result<(), ApiError> {
        if self.clubs.iter().any(|(c, _)| c.id == club_id) {
            Ok(())
        } else {
            Err(fail(404, "No such club."))
        }
    }
}

#[derive(Default)]
pub struct FakeBackend {
    state: Mutex<State>,
    scripts: Mutex<HashMap<String, VecDeque<Scripted>>>,
    requests: Mutex<Vec<(String, String)>>,
    write_delay: Mutex<Duration>,
}

fn club(id: i64, name: &str) -> Club {
    Club {
        id,
        name: name.to_string(),
        description: None,
        category: None,
        logo_url: None,
        member_count: None,
    }
}

fn membership(club_id: i64, user_id: i64, role: MemberRole, status: MembershipStatus) -> Membership {
    let name = match user_id {
        ANA => "Ana",
        BEN => "Ben",
        _ => "Cara",
    };
    Membership {
        club_id,
        user_id,
        role,
        status,
        officer_title: None,
        user_name: Some(name.to_string()),
        requested_at: None,
    }
}

fn fail(status: u16, message: &str) -> ApiError {
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_REQUEST);
    ApiError::from_status(status, &json!({ "message": message }).to_string())
}

fn invalid(field: &str) -> ApiError {
    let body = json!({
        "message": format!("The {} field is invalid.", field),
        "errors": { field: [format!("The {} field is invalid.", field)] }
    });
    ApiError::from_status(StatusCode::UNPROCESSABLE_ENTITY, &body.to_string())
}

fn id(segment: &str) -> Result<i64, ApiError> {
    segment.parse().map_err(|_| fail(404, "Not found."))
}

fn field<'a>(body: Option<&'a Value>, name: &str) -> Option<&'a Value> {
    body.and_then(|b| b.get(name)).filter(|v| !v.is_null())
}

fn rows_for(rows: &[Value], key: &str, owner: i64) -> Vec<Value> {
    rows.iter()
        .filter(|r| r.get(key).and_then(Value::as_i64) == Some(owner))
        .cloned()
        .collect()
}

impl FakeBackend {
    /// Ana is an officer of the chess club, where Ben has a pending request
    /// and Cara is a member. Ana has no relation to robotics or soccer.
    pub fn seeded() -> Self {
        let backend = Self::default();
        {
            let mut state = backend.state.lock();
            state.clubs = vec![
                (club(CHESS, "Chess"), "academics"),
                (club(ROBOTICS, "Robotics"), "academics"),
                (club(SOCCER, "Soccer"), "sports"),
            ];
            state.memberships = vec![
                membership(CHESS, ANA, MemberRole::Officer, MembershipStatus::Approved),
                membership(CHESS, BEN, MemberRole::Member, MembershipStatus::Pending),
                membership(CHESS, CARA, MemberRole::Member, MembershipStatus::Approved),
            ];
            state.events = vec![json!({
                "id": OPENING_NIGHT, "club_id": CHESS, "title": "Opening Night",
                "starts_at": "2026-09-01T18:00:00Z"
            })];
            state.tasks = vec![json!({
                "id": BOARD_INVENTORY, "club_id": CHESS, "title": "Count the boards", "status": "todo"
            })];
            state.attendance = vec![json!({
                "event_id": OPENING_NIGHT, "user_id": ANA, "user_name": "Ana", "status": "present"
            })];
            state.next_id = 1000;
        }
        backend
    }

    /// Queue a response for the next GET of `path`, served after `delay`.
    pub fn script_get(&self, path: &str, delay: Duration, body: Value) {
        self.scripts
            .lock()
            .entry(path.to_string())
            .or_default()
            .push_back(Scripted { delay, body });
    }

    /// Delay every write by `delay` before it is handled.
    pub fn set_write_delay(&self, delay: Duration) {
        *self.write_delay.lock() = delay;
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    fn authorize(token: Option<&str>) -> Result<(), ApiError> {
        match token {
            Some(FAKE_TOKEN) => Ok(()),
            _ => Err(ApiError::Unauthorized),
        }
    }

    fn clubs_where(&self, pred: impl Fn(&[Membership], i64) -> bool) -> Vec<Club> {
        let state = self.state.lock();
        state
            .clubs
            .iter()
            .filter(|(c, _)| pred(&state.memberships, c.id))
            .map(|(c, _)| c.clone())
            .collect()
    }

    fn ana_status(memberships: &[Membership], club_id: i64) -> Option<MembershipStatus> {
        memberships
            .iter()
            .find(|m| m.club_id == club_id && m.user_id == ANA)
            .map(|m| m.status)
    }

    fn route_get(&self, path: &str) -> Result<Value, ApiError> {
        let segments: Vec<&str> = path.split('/').collect();
        match segments.as_slice() {
            ["user"] => Ok(json!({
                "user": {"id": ANA, "name": "Ana", "email": "ana@example.edu", "role": "officer"}
            })),
            ["clubs", "mine"] => {
                let clubs = self.clubs_where(|m, id| Self::ana_status(m, id) == Some(MembershipStatus::Approved));
                Ok(json!({ "clubs": clubs }))
            }
            ["clubs", "pending"] => {
                let clubs = self.clubs_where(|m, id| Self::ana_status(m, id) == Some(MembershipStatus::Pending));
                Ok(json!({ "data": clubs }))
            }
            ["clubs"] => {
                let state = self.state.lock();
                let mut groups: HashMap<&str, Vec<Club>> = HashMap::new();
                for (c, category) in &state.clubs {
                    if Self::ana_status(&state.memberships, c.id).is_none() {
                        groups.entry(*category).or_default().push(c.clone());
                    }
                }
                Ok(json!(groups))
            }
            ["clubs", club, list @ ("requests" | "members")] => {
                let club_id = id(club)?;
                let state = self.state.lock();
                state.has_club(club_id)?;
                let wanted = if *list == "requests" {
                    MembershipStatus::Pending
                } else {
                    MembershipStatus::Approved
                };
                let rows: Vec<&Membership> = state
                    .memberships
                    .iter()
                    .filter(|m| m.club_id == club_id && m.status == wanted)
                    .collect();
                Ok(json!(rows))
            }
            ["clubs", club, "events"] => {
                let state = self.state.lock();
                Ok(json!({ "events": rows_for(&state.events, "club_id", id(club)?) }))
            }
            ["clubs", club, "tasks"] => {
                let state = self.state.lock();
                Ok(json!({ "data": { "tasks": rows_for(&state.tasks, "club_id", id(club)?) } }))
            }
            ["clubs", club, "announcements"] => {
                let state = self.state.lock();
                Ok(json!(rows_for(&state.announcements, "club_id", id(club)?)))
            }
            ["events", event, "attendance"] => {
                let state = self.state.lock();
                Ok(json!({ "attendance": rows_for(&state.attendance, "event_id", id(event)?) }))
            }
            ["admin", "metrics"] => {
                let state = self.state.lock();
                let pending = state.memberships.iter().filter(|m| m.is_pending()).count();
                Ok(json!({
                    "metrics": {
                        "total_users": 3,
                        "total_clubs": state.clubs.len(),
                        "pending_requests": pending,
                        "clubs_by_category": {"academics": 2, "sports": 1}
                    }
                }))
            }
            _ => Err(fail(404, "Not found.")),
        }
    }

    fn route_write(&self, method: Method, path: &str, body: Option<&Value>) -> Result<Value, ApiError> {
        let segments: Vec<&str> = path.split('/').collect();
        let mut state = self.state.lock();
        match (method, segments.as_slice()) {
            (Method::Post, ["clubs", club, "join"]) => {
                let club_id = id(club)?;
                state.has_club(club_id)?;
                if Self::ana_status(&state.memberships, club_id).is_some() {
                    return Err(fail(409, "You already have a membership or request for this club."));
                }
                state
                    .memberships
                    .push(membership(club_id, ANA, MemberRole::Member, MembershipStatus::Pending));
                Ok(json!({ "message": "Join request sent." }))
            }
            (Method::Delete, ["clubs", club, "join"]) => {
                let club_id = id(club)?;
                let before = state.memberships.len();
                state
                    .memberships
                    .retain(|m| !(m.club_id == club_id && m.user_id == ANA && m.is_pending()));
                if state.memberships.len() == before {
                    return Err(fail(404, "No pending request to cancel."));
                }
                Ok(json!({}))
            }
            (Method::Delete, ["clubs", club, "membership"]) => {
                let club_id = id(club)?;
                let before = state.memberships.len();
                state.memberships.retain(|m| {
                    !(m.club_id == club_id && m.user_id == ANA && m.status == MembershipStatus::Approved)
                });
                if state.memberships.len() == before {
                    return Err(fail(404, "You are not a member of this club."));
                }
                Ok(Value::Null)
            }
            (Method::Patch, ["clubs", club, "members", user, "status"]) => {
                let (club_id, user_id) = (id(club)?, id(user)?);
                let status = field(body, "status")
                    .and_then(Value::as_str)
                    .and_then(MembershipStatus::parse)
                    .ok_or_else(|| invalid("status"))?;
                let row = state
                    .memberships
                    .iter_mut()
                    .find(|m| m.club_id == club_id && m.user_id == user_id)
                    .ok_or_else(|| fail(404, "No such membership."))?;
                row.status = status;
                Ok(json!({ "membership": row.clone() }))
            }
            (Method::Patch, ["clubs", club, "members", user, "role"]) => {
                let (club_id, user_id) = (id(club)?, id(user)?);
                let role: MemberRole = field(body, "role")
                    .and_then(|v| serde_json::from_value(v.clone()).ok())
                    .ok_or_else(|| invalid("role"))?;
                let title = field(body, "officer_title").and_then(Value::as_str).map(str::to_string);
                let row = state
                    .memberships
                    .iter_mut()
                    .find(|m| m.club_id == club_id && m.user_id == user_id && !m.is_pending())
                    .ok_or_else(|| fail(404, "No such member."))?;
                row.role = role;
                row.officer_title = title;
                Ok(json!({ "membership": row.clone() }))
            }
            (Method::Delete, ["clubs", club, "members", user]) => {
                let (club_id, user_id) = (id(club)?, id(user)?);
                let before = state.memberships.len();
                state
                    .memberships
                    .retain(|m| !(m.club_id == club_id && m.user_id == user_id));
                if state.memberships.len() == before {
                    return Err(fail(404, "No such member."));
                }
                Ok(json!({ "message": "Member removed." }))
            }
            (Method::Post, ["clubs", club, "events"]) => {
                let club_id = id(club)?;
                state.has_club(club_id)?;
                let title = field(body, "title").cloned().ok_or_else(|| invalid("title"))?;
                let starts_at = field(body, "starts_at").cloned().ok_or_else(|| invalid("starts_at"))?;
                let event_id = state.next_id();
                let event = json!({ "id": event_id, "club_id": club_id, "title": title, "starts_at": starts_at });
                state.events.push(event.clone());
                Ok(json!({ "event": event }))
            }
            (Method::Delete, ["events", event]) => {
                let event_id = id(event)?;
                let before = state.events.len();
                state
                    .events
                    .retain(|e| e.get("id").and_then(Value::as_i64) != Some(event_id));
                if state.events.len() == before {
                    return Err(fail(404, "No such event."));
                }
                state
                    .attendance
                    .retain(|a| a.get("event_id").and_then(Value::as_i64) != Some(event_id));
                Ok(Value::Null)
            }
            (Method::Post, ["clubs", club, "tasks"]) => {
                let club_id = id(club)?;
                state.has_club(club_id)?;
                let title = field(body, "title").cloned().ok_or_else(|| invalid("title"))?;
                let task_id = state.next_id();
                let task = json!({ "id": task_id, "club_id": club_id, "title": title, "status": "todo" });
                state.tasks.push(task.clone());
                Ok(json!({ "task": task }))
            }
            (Method::Patch, ["tasks", task]) => {
                let task_id = id(task)?;
                let status = field(body, "status").cloned().ok_or_else(|| invalid("status"))?;
                let row = state
                    .tasks
                    .iter_mut()
                    .find(|t| t.get("id").and_then(Value::as_i64) == Some(task_id))
                    .ok_or_else(|| fail(404, "No such task."))?;
                row["status"] = status;
                Ok(json!({ "task": row.clone() }))
            }
            (Method::Post, ["events", event, "attendance"]) => {
                let event_id = id(event)?;
                if !state
                    .events
                    .iter()
                    .any(|e| e.get("id").and_then(Value::as_i64) == Some(event_id))
                {
                    return Err(fail(404, "No such event."));
                }
                let user_id = field(body, "user_id").and_then(Value::as_i64).ok_or_else(|| invalid("user_id"))?;
                let status = field(body, "status").cloned().ok_or_else(|| invalid("status"))?;
                state.attendance.retain(|a| {
                    !(a.get("event_id").and_then(Value::as_i64) == Some(event_id)
                        && a.get("user_id").and_then(Value::as_i64) == Some(user_id))
                });
                state
                    .attendance
                    .push(json!({ "event_id": event_id, "user_id": user_id, "status": status }));
                Ok(json!({ "message": "Attendance recorded." }))
            }
            (Method::Post, ["clubs", club, "announcements"]) => {
                let club_id = id(club)?;
                state.has_club(club_id)?;
                let title = field(body, "title").cloned().ok_or_else(|| invalid("title"))?;
                let text = field(body, "body").cloned().ok_or_else(|| invalid("body"))?;
                let announcement_id = state.next_id();
                state
                    .announcements
                    .push(json!({ "id": announcement_id, "club_id": club_id, "title": title, "content": text }));
                Ok(json!({}))
            }
            _ => Err(fail(404, "Not found.")),
        }
    }
}

#[async_trait]
impl Backend for FakeBackend {
    async fn get_json(&self, path: &str, token: Option<&str>) -> Result<Value, ApiError> {
        self.requests.lock().push(("GET".to_string(), path.to_string()));
        Self::authorize(token)?;

        let scripted = self.scripts.lock().get_mut(path).and_then(VecDeque::pop_front);
        if let Some(scripted) = scripted {
            tokio::time::sleep(scripted.delay).await;
            return Ok(scripted.body);
        }
        self.route_get(path)
    }

    async fn send_json(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
        body: Option<&Value>,
    ) -> Result<Value, ApiError> {
        self.requests.lock().push((method.to_string(), path.to_string()));

        let delay = *self.write_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        match path {
            "login" | "register" => {
                let password = body.and_then(|b| b.get("password")).and_then(Value::as_str);
                if password == Some(FAKE_PASSWORD) {
                    Ok(json!({
                        "token": FAKE_TOKEN,
                        "user": {"id": ANA, "name": "Ana", "email": "ana@example.edu", "role": "officer"}
                    }))
                } else {
                    Err(ApiError::from_status(
                        StatusCode::UNPROCESSABLE_ENTITY,
                        r#"{"message":"These credentials do not match our records.","errors":{"email":["These credentials do not match our records."]}}"#,
                    ))
                }
            }
            "email/resend" | "forgot-password" => {
                if field(body, "email").and_then(Value::as_str) == Some(BOUNCING_EMAIL) {
                    return Err(invalid("email"));
                }
                Ok(json!({ "message": "Sent." }))
            }
            "reset-password" => Ok(json!({ "message": "Password reset." })),
            "logout" => {
                Self::authorize(token)?;
                Ok(Value::Null)
            }
            _ => {
                Self::authorize(token)?;
                self.route_write(method, path, body)
            }
        }
    }
}
