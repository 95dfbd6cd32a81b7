//! Swap pipeline
//!
//! Drives one swap through quote, parameter building, optional preflight,
//! signing, broadcast and confirmation. Every run is a strict state machine;
//! each transition is logged and, when configured, appended to the audit trail.

use crate::audit::AuditLog;
use crate::broadcast::Broadcaster;
use crate::config::{Config, ContractAddresses, RpcConfig};
use crate::error::{Error, Result, Stage};
use crate::params::{ParameterBuilder, DEFAULT_DEADLINE_WINDOW};
use crate::quote::QuoteService;
use crate::receipt::{Receipt, ReceiptResolver, DEFAULT_POLL_INTERVAL};
use crate::rpc::{ChainClient, MinedReceipt, ProviderClient};
use crate::simulator::{SimulationError, SimulationResult, TransactionSimulator};
use crate::swap::{Quote, SwapParameters, SwapRequest};
use crate::wallet::{
    encode_swap_call, CredentialProvider, GasConfig, NonceManager, TransactionSigner,
};
use alloy::primitives::Address;
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Progress of one pipeline run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Quoted,
    ParametersBuilt,
    Signed,
    Broadcast,
    Pending,
    Confirmed,
    Reverted,
    TimedOut,
    Aborted { stage: Stage, reason: String },
}

impl PipelineState {
    pub fn name(&self) -> &'static str {
        match self {
            PipelineState::Idle => "idle",
            PipelineState::Quoted => "quoted",
            PipelineState::ParametersBuilt => "parameters_built",
            PipelineState::Signed => "signed",
            PipelineState::Broadcast => "broadcast",
            PipelineState::Pending => "pending",
            PipelineState::Confirmed => "confirmed",
            PipelineState::Reverted => "reverted",
            PipelineState::TimedOut => "timed_out",
            PipelineState::Aborted { .. } => "aborted",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PipelineState::Confirmed
                | PipelineState::Reverted
                | PipelineState::TimedOut
                | PipelineState::Aborted { .. }
        )
    }

    /// Whether `next` directly follows this state
    pub fn can_transition_to(&self, next: &PipelineState) -> bool {
        use PipelineState::*;

        if self.is_terminal() {
            return false;
        }
        matches!(
            (self, next),
            (_, Aborted { .. })
                | (Idle, Quoted)
                | (Quoted, ParametersBuilt)
                | (ParametersBuilt, Signed)
                | (Signed, Broadcast)
                | (Broadcast, Pending)
                | (Pending, Confirmed | Reverted | TimedOut)
        )
    }
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineState::Aborted { stage, reason } => {
                write!(f, "aborted at {}: {}", stage, reason)
            }
            other => f.write_str(other.name()),
        }
    }
}

/// Network handles and signing account a pipeline runs against
pub struct ExecutionContext {
    quote_client: Arc<dyn ChainClient>,
    execution_client: Arc<dyn ChainClient>,
    credentials: Arc<dyn CredentialProvider>,
    nonces: Arc<NonceManager>,
    chain_id: u64,
    contracts: ContractAddresses,
    divergent: bool,
}

impl ExecutionContext {
    /// Quotes and executes against the same endpoint
    pub fn new(
        client: Arc<dyn ChainClient>,
        credentials: Arc<dyn CredentialProvider>,
        chain_id: u64,
        contracts: ContractAddresses,
    ) -> Self {
        Self {
            quote_client: client.clone(),
            execution_client: client,
            credentials,
            nonces: Arc::new(NonceManager::new()),
            chain_id,
            contracts,
            divergent: false,
        }
    }

    /// Quote from a different endpoint than the one transactions are sent to
    pub fn with_quote_client(
        mut self,
        client: Arc<dyn ChainClient>,
        acknowledge_state_divergence: bool,
    ) -> Result<Self> {
        if !acknowledge_state_divergence {
            return Err(Error::Config(
                "separate quote endpoint requires acknowledge_state_divergence".into(),
            ));
        }
        self.quote_client = client;
        self.divergent = true;
        Ok(self)
    }

    /// Share nonce bookkeeping with other contexts signing for the same account
    pub fn with_nonce_manager(mut self, nonces: Arc<NonceManager>) -> Self {
        self.nonces = nonces;
        self
    }

    /// Build a context from configuration, connecting HTTP providers
    ///
    /// Fails with `Config` when the execution endpoint reports a different
    /// chain than the configured network.
    pub async fn connect(
        config: &Config,
        rpc: &RpcConfig,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Result<Self> {
        let endpoints = config.resolve_endpoints(rpc)?;

        let execution = ProviderClient::connect(&endpoints.execution)
            .map_err(|e| Error::Config(format!("execution endpoint: {}", e)))?;
        tracing::info!(
            network = %config.network,
            host = execution.host(),
            "Connected execution endpoint"
        );
        let execution: Arc<dyn ChainClient> = Arc::new(execution);
        verify_chain(execution.as_ref(), config.chain_id()).await?;

        let context = Self::new(execution, credentials, config.chain_id(), config.contracts());
        if !endpoints.divergent {
            return Ok(context);
        }

        let quote = ProviderClient::connect(&endpoints.quote)
            .map_err(|e| Error::Config(format!("quote endpoint: {}", e)))?;
        tracing::warn!(
            host = quote.host(),
            "Quotes come from a separate endpoint; minimum outputs may not reflect execution state"
        );
        // validate() has already required the acknowledgement
        context.with_quote_client(Arc::new(quote), true)
    }

    pub fn account(&self) -> Address {
        self.credentials.address()
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn contracts(&self) -> ContractAddresses {
        self.contracts
    }

    pub fn is_divergent(&self) -> bool {
        self.divergent
    }
}

async fn verify_chain(client: &dyn ChainClient, expected: u64) -> Result<()> {
    let reported = client
        .chain_id()
        .await
        .map_err(|e| Error::Config(format!("cannot read chain id: {}", e)))?;
    if reported != expected {
        return Err(Error::Config(format!(
            "endpoint is on chain {}, expected {}",
            reported, expected
        )));
    }
    Ok(())
}

/// Per-run knobs
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub gas: GasConfig,
    pub deadline_window: Duration,
    pub confirmation_timeout: Duration,
    pub poll_interval: Duration,
    pub preflight: bool,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            gas: GasConfig::default(),
            deadline_window: DEFAULT_DEADLINE_WINDOW,
            confirmation_timeout: Duration::from_secs(180),
            poll_interval: DEFAULT_POLL_INTERVAL,
            preflight: false,
        }
    }
}

impl PipelineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            gas: config.gas,
            deadline_window: config.deadline_window(),
            confirmation_timeout: config.confirmation_timeout(),
            poll_interval: config.poll_interval(),
            preflight: config.preflight,
        }
    }
}

/// Output of a dry run: everything short of signing
#[derive(Debug, Clone)]
pub struct SwapPlan {
    pub quote: Quote,
    pub parameters: SwapParameters,
    pub simulation: Option<SimulationResult>,
}

/// State tracker for one run
struct Run<'a> {
    id: Uuid,
    state: PipelineState,
    audit: Option<&'a AuditLog>,
}

impl<'a> Run<'a> {
    fn new(audit: Option<&'a AuditLog>) -> Self {
        Self {
            id: Uuid::new_v4(),
            state: PipelineState::Idle,
            audit,
        }
    }

    async fn advance(&mut self, next: PipelineState, detail: Value) {
        if !self.state.can_transition_to(&next) {
            // Only reachable through a bug in the driver below
            tracing::error!(from = %self.state, to = %next, "Invalid pipeline transition");
            debug_assert!(false, "invalid transition {} -> {}", self.state, next);
        }

        match &next {
            PipelineState::Aborted { stage, reason } => {
                tracing::warn!(run_id = %self.id, stage = %stage, %reason, "Swap aborted");
            }
            PipelineState::Reverted | PipelineState::TimedOut => {
                tracing::warn!(run_id = %self.id, state = next.name(), %detail, "Swap finished");
            }
            other => {
                tracing::info!(run_id = %self.id, state = other.name(), %detail, "Swap state")
            }
        }

        if let Some(audit) = self.audit {
            audit.record(self.id, next.name(), detail).await;
        }
        self.state = next;
    }

    async fn abort(&mut self, err: &Error) {
        let next = PipelineState::Aborted {
            stage: err.stage(),
            reason: err.to_string(),
        };
        let detail = json!({
            "stage": err.stage().name(),
            "reason": err.to_string(),
            "safe_to_retry": err.safe_to_retry_with_fresh_parameters(),
        });
        self.advance(next, detail).await;
    }
}

pub struct SwapPipeline {
    context: ExecutionContext,
    settings: PipelineSettings,
    audit: Option<AuditLog>,
}

impl SwapPipeline {
    pub fn new(context: ExecutionContext, settings: PipelineSettings) -> Self {
        Self {
            context,
            settings,
            audit: None,
        }
    }

    pub fn with_audit(mut self, audit: AuditLog) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn context(&self) -> &ExecutionContext {
        &self.context
    }

    /// Quote only; no state machine, nothing audited
    pub async fn quote(&self, request: &SwapRequest) -> Result<Quote> {
        self.quote_service()
            .quote(
                request.token_in,
                request.token_out,
                request.fee_tier,
                request.amount_in,
                request.effective_price_limit(),
            )
            .await
    }

    /// Quote, build and (if enabled) simulate without signing
    pub async fn plan(&self, request: &SwapRequest) -> Result<SwapPlan> {
        let mut run = Run::new(self.audit.as_ref());
        let outcome = self.prepare(request, &mut run).await;
        if let Err(err) = &outcome {
            run.abort(err).await;
        }
        outcome
    }

    /// Run the full pipeline
    ///
    /// Returns the mined receipt (`Confirmed` or `Reverted`). A receipt that
    /// does not arrive within the confirmation timeout is reported as
    /// `Error::ConfirmationTimeout`; the transaction may still be mined.
    pub async fn execute(&self, request: &SwapRequest) -> Result<Receipt> {
        let mut run = Run::new(self.audit.as_ref());
        let outcome = self.drive(request, &mut run).await;
        if let Err(err) = &outcome {
            if !run.state.is_terminal() {
                run.abort(err).await;
            }
        }
        outcome
    }

    async fn prepare(&self, request: &SwapRequest, run: &mut Run<'_>) -> Result<SwapPlan> {
        if self.context.divergent {
            tracing::warn!(
                "Quote endpoint differs from execution endpoint; amount_out_minimum is derived from a different state"
            );
        }

        let quote = self.quote(request).await?;
        run.advance(
            PipelineState::Quoted,
            json!({
                "token_in": quote.token_in,
                "token_out": quote.token_out,
                "fee_tier": quote.fee_tier.as_u32(),
                "amount_in": quote.amount_in.to_string(),
                "expected_amount_out": quote.expected_amount_out.to_string(),
            }),
        )
        .await;

        let parameters = ParameterBuilder::new(self.settings.deadline_window)
            .with_default_recipient(self.context.account())
            .build(request, &quote, Utc::now())?;
        run.advance(
            PipelineState::ParametersBuilt,
            json!({
                "recipient": parameters.recipient,
                "deadline": parameters.deadline,
                "amount_out_minimum": parameters.amount_out_minimum.to_string(),
            }),
        )
        .await;

        let simulation = if self.settings.preflight {
            Some(self.preflight(&parameters).await?)
        } else {
            None
        };

        Ok(SwapPlan {
            quote,
            parameters,
            simulation,
        })
    }

    async fn preflight(&self, parameters: &SwapParameters) -> Result<SimulationResult> {
        let result = TransactionSimulator::new(self.context.execution_client.clone())
            .simulate(
                self.context.account(),
                self.context.contracts.router,
                encode_swap_call(parameters)?,
            )
            .await
            .map_err(|e: SimulationError| Error::PreflightUnavailable(e.to_string()))?;

        if !result.success {
            let reason = result
                .revert_reason
                .unwrap_or_else(|| "execution reverted".to_string());
            return Err(Error::PreflightReverted(reason));
        }
        tracing::debug!(gas_used = ?result.gas_used, "Preflight passed");
        Ok(result)
    }

    async fn drive(&self, request: &SwapRequest, run: &mut Run<'_>) -> Result<Receipt> {
        let plan = self.prepare(request, run).await?;
        let account = self.context.account();
        let client = self.context.execution_client.clone();

        let lease = self.context.nonces.acquire(account, client.as_ref()).await?;
        let signer = TransactionSigner::new(self.context.chain_id, self.context.contracts.router);
        let signed = match signer.sign(
            &plan.parameters,
            lease.nonce(),
            &self.settings.gas,
            self.context.credentials.as_ref(),
        ) {
            Ok(signed) => signed,
            Err(e) => {
                lease.release();
                return Err(e);
            }
        };
        run.advance(
            PipelineState::Signed,
            json!({ "account": account, "nonce": signed.nonce(), "tx_hash": signed.hash() }),
        )
        .await;

        let transaction_id = match Broadcaster::new(client.clone()).submit(signed).await {
            Ok(hash) => {
                lease.commit();
                hash
            }
            Err(e) => {
                lease.release();
                return Err(e.into());
            }
        };
        run.advance(
            PipelineState::Broadcast,
            json!({ "tx_hash": transaction_id }),
        )
        .await;
        run.advance(
            PipelineState::Pending,
            json!({
                "tx_hash": transaction_id,
                "timeout_ms": self.settings.confirmation_timeout.as_millis() as u64,
            }),
        )
        .await;

        let receipt = ReceiptResolver::new(client)
            .with_poll_interval(self.settings.poll_interval)
            .await_receipt(transaction_id, self.settings.confirmation_timeout)
            .await?;

        let (next, detail) = match &receipt {
            Receipt::Confirmed(mined) => (PipelineState::Confirmed, mined_detail(mined)),
            Receipt::Reverted(mined) => (PipelineState::Reverted, mined_detail(mined)),
            Receipt::TimedOut { transaction_id } => {
                (PipelineState::TimedOut, json!({ "tx_hash": transaction_id }))
            }
        };
        run.advance(next, detail).await;

        if let Receipt::TimedOut { transaction_id } = receipt {
            return Err(Error::ConfirmationTimeout {
                transaction_id,
                waited: self.settings.confirmation_timeout,
            });
        }
        Ok(receipt)
    }

    fn quote_service(&self) -> QuoteService {
        QuoteService::new(self.context.quote_client.clone(), self.context.contracts.quoter)
    }
}

fn mined_detail(mined: &MinedReceipt) -> Value {
    json!({
        "tx_hash": mined.transaction_id,
        "block_number": mined.block_number,
        "gas_used": mined.gas_used,
    })
}
