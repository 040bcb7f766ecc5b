//! Action dispatcher.
//!
//! Runs the three action entry points against a history record. Every
//! failure is caught here, recorded on the record where an action context
//! exists, and returned to the caller as `{error}`. A `processing` write is
//! always followed by a terminal write on the same control path.

use tracing::{debug, error, info, warn};

use snipline_core::template;
use snipline_core::types::{
    ExecutionStatus, HistoryRecord, PromptConfig, PromptExecution, ProviderConfig, RecordId,
    WebhookConfig, WebhookExecution,
};
use snipline_storage::HistoryLedger;

use crate::error::ActionError;
use crate::provider::ProviderRegistry;
use crate::resolver::SettingsResolver;
use crate::run::{ActionKind, ActionRun};
use crate::types::{ActionRequest, ActionResponse, PromptAction, PromptWebhookAction, WebhookAction};
use crate::webhook::WebhookClient;

const RECORD_NOT_FOUND: &str = "History record not found";

/// Everything a prompt run needs once settings are resolved.
struct PreparedPrompt {
    prompt: PromptConfig,
    provider: ProviderConfig,
    schema: Option<serde_json::Value>,
}

#[derive(Clone)]
pub struct Dispatcher {
    ledger: HistoryLedger,
    resolver: SettingsResolver,
    providers: ProviderRegistry,
    webhooks: WebhookClient,
}

impl Dispatcher {
    pub fn new(
        ledger: HistoryLedger,
        resolver: SettingsResolver,
        providers: ProviderRegistry,
        webhooks: WebhookClient,
    ) -> Self {
        Self {
            ledger,
            resolver,
            providers,
            webhooks,
        }
    }

    pub fn ledger(&self) -> &HistoryLedger {
        &self.ledger
    }

    pub fn resolver(&self) -> &SettingsResolver {
        &self.resolver
    }

    /// Handle one action message. Never fails; errors become `{error}`.
    ///
    /// The action runs on its own task, so it settles on the ledger even
    /// when the caller stops waiting for the response.
    pub async fn dispatch(&self, request: ActionRequest) -> ActionResponse {
        let record_id = request.record_id();
        let dispatcher = self.clone();
        let task = tokio::spawn(async move { dispatcher.run(request).await });

        let result = match task.await {
            Ok(result) => result,
            Err(e) => {
                error!(record_id = %record_id, error = %e, "Action task aborted");
                return ActionResponse::error(format!("Action task aborted: {}", e));
            }
        };
        if let Err(ref e) = result {
            warn!(record_id = %record_id, error = %e, "Action failed");
        }
        result.into()
    }

    async fn run(&self, request: ActionRequest) -> Result<(), ActionError> {
        match &request {
            ActionRequest::ExecutePrompt(action) => self.execute_prompt(action).await,
            ActionRequest::ExecuteWebhook(action) => self.execute_webhook(action).await,
            ActionRequest::ExecutePromptWebhook(action) => {
                self.execute_prompt_webhook(action).await
            }
        }
    }

    /// Run a prompt and, when it is bound to a POST/PUT webhook, chain that
    /// webhook off the completion.
    pub async fn execute_prompt(&self, action: &PromptAction) -> Result<(), ActionError> {
        let record_id = action.record_id;
        self.require_record(record_id).await?;

        let mut run = ActionRun::new(ActionKind::Prompt, record_id, &action.prompt_name);
        let attempt = PromptExecution::processing(&action.prompt_name);

        let prepared = match self.prepare_prompt(&action.prompt_name) {
            Ok(prepared) => prepared,
            Err(e) => {
                let status = settle(&mut run, false);
                let failed = attempt.finish(status, e.to_string());
                self.write_prompt(record_id, failed).await?;
                info!(record_id = %record_id, prompt = %action.prompt_name, error = %e, "Prompt rejected before dispatch");
                return Err(e);
            }
        };

        let status = run.start()?;
        self.write_prompt(record_id, attempt.clone()).await?;
        info!(record_id = %record_id, prompt = %prepared.prompt.name, run_id = %run.id, status = %status, "Prompt processing");

        let rendered = template::render_text(&prepared.prompt.template, &action.text);
        let completion = self
            .providers
            .complete(&prepared.provider, &rendered, prepared.schema.as_ref())
            .await;

        match completion {
            Ok(text) => {
                let chained = self.chain_webhook(&prepared.prompt, &text).await;
                let status = settle(&mut run, true);
                let mut done = attempt.finish(status, text);
                done.chained_webhook = chained;
                self.write_prompt(record_id, done).await?;
                info!(record_id = %record_id, prompt = %prepared.prompt.name, elapsed_ms = run.elapsed_ms() as u64, "Prompt succeeded");
                Ok(())
            }
            Err(e) => {
                let status = settle(&mut run, false);
                self.write_prompt(record_id, attempt.finish(status, e.to_string()))
                    .await?;
                info!(record_id = %record_id, prompt = %prepared.prompt.name, error = %e, "Prompt failed");
                Err(e)
            }
        }
    }

    /// Run a webhook with the record's text, replacing any earlier attempt.
    pub async fn execute_webhook(&self, action: &WebhookAction) -> Result<(), ActionError> {
        let record_id = action.record_id;
        self.require_record(record_id).await?;
        let webhook = self.resolver.webhook(&action.webhook_id)?;

        let mut run = ActionRun::new(ActionKind::Webhook, record_id, &webhook.id);
        let attempt = WebhookExecution::processing(&webhook);
        run.start()?;
        self.write_webhook(record_id, &webhook.id, attempt.clone())
            .await?;
        info!(record_id = %record_id, webhook = %webhook.id, run_id = %run.id, "Webhook processing");

        let outcome = self.webhooks.invoke(&webhook, &action.text, false).await;
        let (terminal, result) = finish_webhook(&mut run, attempt, outcome);
        self.write_webhook(record_id, &webhook.id, terminal).await?;
        info!(record_id = %record_id, webhook = %webhook.id, elapsed_ms = run.elapsed_ms() as u64, state = %run.state(), "Webhook settled");
        result
    }

    /// Re-run the webhook chained off an existing prompt result.
    pub async fn execute_prompt_webhook(
        &self,
        action: &PromptWebhookAction,
    ) -> Result<(), ActionError> {
        let record_id = action.record_id;
        let record = self.require_record(record_id).await?;
        if !record.prompt_results.contains_key(&action.prompt_name) {
            return Err(ActionError::config(format!(
                "No prompt result for {} on this record",
                action.prompt_name
            )));
        }
        let webhook = self.resolver.webhook(&action.webhook_id)?;

        let mut run = ActionRun::new(ActionKind::PromptWebhook, record_id, &webhook.id);
        let attempt = WebhookExecution::processing(&webhook);

        let prompt = match self.resolver.prompt(&action.prompt_name) {
            Ok(prompt) => prompt,
            Err(e) => {
                let status = settle(&mut run, false);
                let failed = attempt.finish(status, e.to_string());
                self.write_chained(record_id, &action.prompt_name, failed)
                    .await?;
                return Err(e);
            }
        };

        run.start()?;
        self.write_chained(record_id, &action.prompt_name, attempt.clone())
            .await?;
        info!(record_id = %record_id, prompt = %prompt.name, webhook = %webhook.id, run_id = %run.id, "Chained webhook processing");

        let outcome = self
            .webhooks
            .invoke(&webhook, &action.text, prompt.has_schema())
            .await;
        let (terminal, result) = finish_webhook(&mut run, attempt, outcome);
        self.write_chained(record_id, &action.prompt_name, terminal)
            .await?;
        info!(record_id = %record_id, prompt = %prompt.name, webhook = %webhook.id, state = %run.state(), "Chained webhook settled");
        result
    }

    fn prepare_prompt(&self, prompt_name: &str) -> Result<PreparedPrompt, ActionError> {
        let prompt = self.resolver.prompt(prompt_name)?;
        let provider = self.resolver.provider(&prompt.provider_config_id)?;
        if provider.is_missing_credential() {
            return Err(ActionError::config(format!(
                "No API key configured for {}",
                provider.provider
            )));
        }
        let schema = self.resolver.prompt_schema(&prompt)?;
        Ok(PreparedPrompt {
            prompt,
            provider,
            schema,
        })
    }

    /// Invoke the prompt's bound webhook, if it has one that carries a body.
    ///
    /// The outcome is recorded either way; it never fails the prompt.
    async fn chain_webhook(&self, prompt: &PromptConfig, text: &str) -> Option<WebhookExecution> {
        let webhook_id = prompt.webhook_id.as_deref()?;
        let webhook: WebhookConfig = match self.resolver.webhook(webhook_id) {
            Ok(webhook) => webhook,
            Err(e) => {
                debug!(prompt = %prompt.name, webhook = %webhook_id, error = %e, "Skipping chained webhook");
                return None;
            }
        };
        if !webhook.method.has_body() {
            debug!(prompt = %prompt.name, webhook = %webhook.id, method = %webhook.method, "Chained webhook has no body; skipped");
            return None;
        }

        let attempt = WebhookExecution::processing(&webhook);
        let execution = match self.webhooks.invoke(&webhook, text, prompt.has_schema()).await {
            Ok(body) => attempt.finish(ExecutionStatus::Success, body),
            Err(e) => {
                warn!(prompt = %prompt.name, webhook = %webhook.id, error = %e, "Chained webhook failed");
                attempt.finish(ExecutionStatus::Error, e.to_string())
            }
        };
        Some(execution)
    }

    async fn require_record(&self, id: RecordId) -> Result<HistoryRecord, ActionError> {
        self.ledger
            .get(id)
            .await?
            .ok_or_else(|| ActionError::config(RECORD_NOT_FOUND))
    }

    async fn update<F>(&self, id: RecordId, mutator: F) -> Result<(), ActionError>
    where
        F: FnOnce(&mut HistoryRecord) + Send + 'static,
    {
        match self.ledger.update_record(id, mutator).await? {
            Some(_) => Ok(()),
            None => Err(ActionError::config(RECORD_NOT_FOUND)),
        }
    }

    async fn write_prompt(&self, id: RecordId, execution: PromptExecution) -> Result<(), ActionError> {
        self.update(id, move |record| {
            record
                .prompt_results
                .insert(execution.prompt_name.clone(), execution);
        })
        .await
    }

    async fn write_webhook(
        &self,
        id: RecordId,
        webhook_id: &str,
        execution: WebhookExecution,
    ) -> Result<(), ActionError> {
        let key = webhook_id.to_string();
        self.update(id, move |record| {
            record.webhook_results.insert(key, vec![execution]);
        })
        .await
    }

    async fn write_chained(
        &self,
        id: RecordId,
        prompt_name: &str,
        execution: WebhookExecution,
    ) -> Result<(), ActionError> {
        let name = prompt_name.to_string();
        self.update(id, move |record| {
            if let Some(prompt) = record.prompt_results.get_mut(&name) {
                prompt.chained_webhook = Some(execution);
            }
        })
        .await
    }
}

/// Terminal transition for `run`. A run that has already settled keeps the
/// status implied by `succeeded` so the terminal write still happens.
fn settle(run: &mut ActionRun, succeeded: bool) -> ExecutionStatus {
    match run.finish(succeeded) {
        Ok(status) => status,
        Err(e) => {
            warn!(run_id = %run.id, error = %e, "Run already settled");
            if succeeded {
                ExecutionStatus::Success
            } else {
                ExecutionStatus::Error
            }
        }
    }
}

fn finish_webhook(
    run: &mut ActionRun,
    attempt: WebhookExecution,
    outcome: Result<String, ActionError>,
) -> (WebhookExecution, Result<(), ActionError>) {
    match outcome {
        Ok(body) => {
            let status = settle(run, true);
            (attempt.finish(status, body), Ok(()))
        }
        Err(e) => {
            let status = settle(run, false);
            (attempt.finish(status, e.to_string()), Err(e))
        }
    }
}
