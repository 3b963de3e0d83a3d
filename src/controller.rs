//! Turn controller
//!
//! Coordinates one voice turn at a time:
//!
//! ```text
//!   idle ──start──▶ listening ──transcript──▶ processing ──played──▶ idle
//!                       │                          │
//!                       └────── error / timeout / cancel / nothing ─┘
//! ```
//!
//! Status lives in a single `watch` channel and only changes through
//! [`TurnController::transition`], which also publishes a [`TurnEvent`].
//! Every exit path of a turn, including a dropped future, goes back to idle.

use std::future::Future;
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{RwLock, broadcast, oneshot, watch};
use tokio::task::JoinHandle;

use crate::config::{Config, TimeoutConfig};
use crate::error::Stage;
use crate::llm::GenerationService;
use crate::persona::PersonaConfig;
use crate::turn::{Turn, TurnEvent, TurnOutcome, TurnStatus};
use crate::voice::{AudioSink, CaptureService, SynthesisService};
use crate::{Error, Result};

/// Capacity of the event broadcast channel
const EVENT_CAPACITY: usize = 64;

/// What to do when a turn is requested while another is in flight
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OverlapPolicy {
    /// Fail the new request with `Error::Busy`
    #[default]
    Reject,
    /// Drop the new request silently
    Ignore,
    /// Cancel the in-flight turn and start the new one
    Cancel,
}

impl FromStr for OverlapPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "reject" => Ok(Self::Reject),
            "ignore" => Ok(Self::Ignore),
            "cancel" => Ok(Self::Cancel),
            other => Err(Error::Config(format!(
                "unknown overlap policy '{other}' (expected reject, ignore, or cancel)"
            ))),
        }
    }
}

impl std::fmt::Display for OverlapPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Reject => write!(f, "reject"),
            Self::Ignore => write!(f, "ignore"),
            Self::Cancel => write!(f, "cancel"),
        }
    }
}

/// External collaborators of the controller
pub struct Services {
    pub capture: Arc<dyn CaptureService>,
    pub generator: Arc<dyn GenerationService>,
    pub synthesizer: Arc<dyn SynthesisService>,
    pub sink: Arc<dyn AudioSink>,
}

/// Single-flow coordinator for voice turns
pub struct TurnController {
    services: Services,
    persona: Arc<RwLock<PersonaConfig>>,
    timeouts: TimeoutConfig,
    overlap: OverlapPolicy,
    status: watch::Sender<TurnStatus>,
    events: broadcast::Sender<TurnEvent>,
    /// Cancels the in-flight turn; present exactly while a turn is active
    in_flight: Mutex<Option<oneshot::Sender<()>>>,
    last_error: Mutex<Option<String>>,
}

impl TurnController {
    /// Create a controller with default timeouts and the reject policy
    #[must_use]
    pub fn new(services: Services, persona: PersonaConfig) -> Self {
        let (status, _) = watch::channel(TurnStatus::Idle);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Self {
            services,
            persona: Arc::new(RwLock::new(persona)),
            timeouts: TimeoutConfig::default(),
            overlap: OverlapPolicy::default(),
            status,
            events,
            in_flight: Mutex::new(None),
            last_error: Mutex::new(None),
        }
    }

    /// Create a controller from loaded configuration
    #[must_use]
    pub fn from_config(services: Services, config: &Config) -> Self {
        Self::new(services, config.persona.clone())
            .with_timeouts(config.timeouts)
            .with_overlap(config.overlap)
    }

    /// Set per-stage bounded waits
    #[must_use]
    pub const fn with_timeouts(mut self, timeouts: TimeoutConfig) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Set the overlapping-request policy
    #[must_use]
    pub const fn with_overlap(mut self, overlap: OverlapPolicy) -> Self {
        self.overlap = overlap;
        self
    }

    /// Current status
    #[must_use]
    pub fn status(&self) -> TurnStatus {
        *self.status.borrow()
    }

    /// Watch the current status
    #[must_use]
    pub fn subscribe_status(&self) -> watch::Receiver<TurnStatus> {
        self.status.subscribe()
    }

    /// Receive every event in order from now on
    #[must_use]
    pub fn subscribe_events(&self) -> broadcast::Receiver<TurnEvent> {
        self.events.subscribe()
    }

    /// Configured overlap policy
    #[must_use]
    pub const fn overlap(&self) -> OverlapPolicy {
        self.overlap
    }

    /// Snapshot of the persona used by the next turn
    pub async fn persona(&self) -> PersonaConfig {
        self.persona.read().await.clone()
    }

    /// Replace the persona; applies from the next generation call
    pub async fn set_persona(&self, persona: PersonaConfig) {
        tracing::info!(user_name = %persona.user_name, tone = %persona.tone, "persona updated");
        *self.persona.write().await = persona;
    }

    /// Message of the most recent failed turn, cleared when a turn starts
    #[must_use]
    pub fn last_error(&self) -> Option<String> {
        self.last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Run one complete turn: capture, generate, synthesize, play
    ///
    /// # Errors
    ///
    /// - `CaptureUnavailable` if capture cannot start (status stays idle)
    /// - `Busy` if a turn is in flight and the policy is `Reject`
    /// - any stage error or `Timeout`; status is back to idle on return
    pub async fn request_turn(&self) -> Result<TurnOutcome> {
        match self.claim_turn().await? {
            Some(claim) => self.drive(claim).await,
            None => Ok(TurnOutcome::Ignored),
        }
    }

    /// Claim a turn now and run the rest of it on a background task
    ///
    /// Returns `None` when the request was ignored. Once this returns a
    /// handle the controller is already listening.
    ///
    /// # Errors
    ///
    /// Same claim errors as [`Self::request_turn`]
    pub async fn start_turn(self: Arc<Self>) -> Result<Option<JoinHandle<Result<TurnOutcome>>>> {
        let Some(claim) = self.claim_turn().await? else {
            return Ok(None);
        };
        Ok(Some(tokio::spawn(async move { self.drive(claim).await })))
    }

    async fn claim_turn(&self) -> Result<Option<Claim>> {
        if let Err(e) = self.services.capture.availability() {
            tracing::error!(error = %e, capture = self.services.capture.name(), "capture unavailable");
            self.report_error(&e);
            return Err(e);
        }

        let claim = self.claim().await?;
        if claim.is_some() {
            self.set_last_error(None);
        }
        Ok(claim)
    }

    async fn drive(&self, claim: Claim) -> Result<TurnOutcome> {
        let guard = IdleGuard(self);
        let mut turn = Turn::new();
        let turn_id = turn.id;
        tracing::info!(%turn_id, "turn started");

        let result = tokio::select! {
            result = self.run_turn(&mut turn) => result,
            Ok(()) = claim.cancel => {
                tracing::info!(%turn_id, "turn cancelled");
                Ok(TurnOutcome::Cancelled)
            }
        };

        drop(guard);

        let elapsed_ms = (chrono::Utc::now() - turn.started_at).num_milliseconds();
        match &result {
            Ok(outcome) => tracing::info!(%turn_id, elapsed_ms, ?outcome, "turn finished"),
            Err(e) => {
                tracing::warn!(%turn_id, error = %e, "turn failed");
                self.report_error(e);
            }
        }

        result
    }

    /// Generate a reply for `transcript` in the given persona
    ///
    /// Returns `Ok(None)` when the service had nothing to say. Does not
    /// change status; [`Self::request_turn`] owns the state machine.
    ///
    /// # Errors
    ///
    /// Returns `Generation` or `Timeout` errors
    pub async fn generate_reply(
        &self,
        transcript: &str,
        persona: &PersonaConfig,
    ) -> Result<Option<String>> {
        let transcript = transcript.trim();
        if transcript.is_empty() {
            return Ok(None);
        }

        let instruction = persona.generation_instruction();
        tracing::debug!(
            generator = self.services.generator.name(),
            instruction = %instruction,
            "generating reply"
        );

        let reply = bounded(
            Stage::Generation,
            self.timeouts.generation,
            self.services.generator.generate(&instruction, transcript),
        )
        .await?;

        Ok(reply
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty()))
    }

    /// Synthesize `reply` in the given persona and play it to completion
    ///
    /// Returns the size of the played payload in bytes.
    ///
    /// # Errors
    ///
    /// Returns `Synthesis`, `Playback`, or `Timeout` errors
    pub async fn synthesize_and_play(&self, reply: &str, persona: &PersonaConfig) -> Result<usize> {
        let instructions = persona.speech_instruction();

        let audio = bounded(
            Stage::Synthesis,
            self.timeouts.synthesis,
            self.services.synthesizer.synthesize(reply, &instructions),
        )
        .await?;

        if audio.is_empty() {
            return Err(Error::Synthesis("empty audio payload".to_string()));
        }

        let bytes = audio.len();
        tracing::debug!(bytes, sink = self.services.sink.name(), "playing reply");

        bounded(
            Stage::Playback,
            self.timeouts.playback,
            self.services.sink.play(audio),
        )
        .await?;

        Ok(bytes)
    }

    async fn run_turn(&self, turn: &mut Turn) -> Result<TurnOutcome> {
        tracing::debug!(capture = self.services.capture.name(), "capturing");
        let transcript = bounded(
            Stage::Capture,
            self.timeouts.capture,
            self.services.capture.capture(),
        )
        .await?;

        let transcript = transcript.trim().to_string();
        if transcript.is_empty() {
            tracing::info!(turn_id = %turn.id, "no speech captured");
            return Ok(TurnOutcome::NoSpeech);
        }

        tracing::info!(turn_id = %turn.id, transcript = %transcript, "you said");
        turn.transcript = Some(transcript.clone());
        self.publish(TurnEvent::Transcript {
            turn_id: turn.id,
            text: transcript.clone(),
        });
        self.transition(TurnStatus::Processing);

        // Read at call time so persona edits never disturb capture
        let persona = self.persona().await;

        let Some(reply) = self.generate_reply(&transcript, &persona).await? else {
            tracing::info!(turn_id = %turn.id, "nothing to say");
            return Ok(TurnOutcome::NoReply { transcript });
        };

        tracing::info!(turn_id = %turn.id, reply = %reply, "replying");
        turn.reply = Some(reply.clone());
        self.publish(TurnEvent::Reply {
            turn_id: turn.id,
            text: reply.clone(),
        });

        turn.audio_bytes = Some(self.synthesize_and_play(&reply, &persona).await?);

        Ok(TurnOutcome::Spoken { transcript, reply })
    }

    /// Claim the controller for a new turn according to the overlap policy
    ///
    /// Returns `None` when the request should be ignored.
    async fn claim(&self) -> Result<Option<Claim>> {
        if let Some(claim) = self.try_claim() {
            return Ok(Some(claim));
        }

        match self.overlap {
            OverlapPolicy::Reject => {
                let status = self.status();
                tracing::debug!(%status, "turn rejected, another is in flight");
                Err(Error::Busy(status))
            }
            OverlapPolicy::Ignore => {
                tracing::debug!("turn ignored, another is in flight");
                Ok(None)
            }
            OverlapPolicy::Cancel => {
                let mut status_rx = self.status.subscribe();
                loop {
                    self.cancel_in_flight();
                    if status_rx.wait_for(|s| s.is_idle()).await.is_err() {
                        return Err(Error::Busy(self.status()));
                    }
                    if let Some(claim) = self.try_claim() {
                        return Ok(Some(claim));
                    }
                }
            }
        }
    }

    /// Move idle to listening and register a cancel handle, atomically
    fn try_claim(&self) -> Option<Claim> {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if !self.transition(TurnStatus::Listening) {
            return None;
        }
        let (tx, cancel) = oneshot::channel();
        *in_flight = Some(tx);
        Some(Claim { cancel })
    }

    fn cancel_in_flight(&self) {
        let sender = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(tx) = sender {
            tracing::debug!("cancelling in-flight turn");
            let _ = tx.send(());
        }
    }

    /// The single status update entry point
    ///
    /// Applies `next` only if it is a legal transition from the current
    /// status, publishing a status event when it does.
    fn transition(&self, next: TurnStatus) -> bool {
        let mut from = TurnStatus::Idle;
        let changed = self.status.send_if_modified(|current| {
            if current.can_transition_to(next) {
                from = *current;
                *current = next;
                true
            } else {
                false
            }
        });

        if changed {
            tracing::debug!(%from, to = %next, "status changed");
            self.publish(TurnEvent::status(next));
        }
        changed
    }

    fn publish(&self, event: TurnEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    fn report_error(&self, error: &Error) {
        let message = error.to_string();
        self.set_last_error(Some(message.clone()));
        self.publish(TurnEvent::Error {
            code: error.code(),
            message,
        });
    }

    fn set_last_error(&self, message: Option<String>) {
        *self.last_error.lock().unwrap_or_else(PoisonError::into_inner) = message;
    }
}

/// A claimed turn: the controller is listening and this turn owns it
struct Claim {
    cancel: oneshot::Receiver<()>,
}

/// Returns the controller to idle however the turn ends
struct IdleGuard<'a>(&'a TurnController);

impl Drop for IdleGuard<'_> {
    fn drop(&mut self) {
        let mut in_flight = self
            .0
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        in_flight.take();
        self.0.transition(TurnStatus::Idle);
    }
}

/// Await `fut` for at most `limit`
async fn bounded<T, F>(stage: Stage, limit: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| Error::Timeout {
            stage,
            secs: limit.as_secs_f64(),
        })?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlap_policy_parses() {
        assert_eq!("reject".parse::<OverlapPolicy>().unwrap(), OverlapPolicy::Reject);
        assert_eq!("Cancel".parse::<OverlapPolicy>().unwrap(), OverlapPolicy::Cancel);
        assert_eq!(" ignore ".parse::<OverlapPolicy>().unwrap(), OverlapPolicy::Ignore);
        assert!("queue".parse::<OverlapPolicy>().is_err());
    }

    #[test]
    fn overlap_policy_defaults_to_reject() {
        assert_eq!(OverlapPolicy::default(), OverlapPolicy::Reject);
        assert_eq!(OverlapPolicy::Cancel.to_string(), "cancel");
    }
}
