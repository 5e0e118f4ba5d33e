use crate::application::engine::PaymentEngine;
use crate::domain::account::AccountId;
use crate::domain::request::RequestId;
use crate::error::Result;
use crate::infrastructure::directory::InMemoryDirectory;
use tracing::info;

/// One ledger instruction, with amounts already in minor units.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Open {
        account: AccountId,
    },
    Deposit {
        account: AccountId,
        amount: i64,
    },
    Transfer {
        from: AccountId,
        to: AccountId,
        amount: i64,
        memo: Option<String>,
    },
    Request {
        requester: AccountId,
        payer: AccountId,
        amount: i64,
        memo: Option<String>,
    },
    Approve {
        request: RequestId,
    },
    Deny {
        request: RequestId,
    },
    Split {
        payer: AccountId,
        recipients: Vec<(AccountId, i64)>,
        total: i64,
        memo: Option<String>,
    },
}

/// Runs commands against an engine whose identity lookup is `directory`.
pub struct CommandRunner<'a> {
    engine: &'a PaymentEngine,
    directory: &'a InMemoryDirectory,
}

impl<'a> CommandRunner<'a> {
    pub fn new(engine: &'a PaymentEngine, directory: &'a InMemoryDirectory) -> Self {
        Self { engine, directory }
    }

    pub async fn run(&self, command: Command) -> Result<()> {
        match command {
            Command::Open { account } => {
                if self.directory.register(account.clone()).await {
                    info!(%account, "account opened");
                }
            }
            Command::Deposit { account, amount } => {
                self.engine.deposit(&account, amount).await?;
            }
            Command::Transfer {
                from,
                to,
                amount,
                memo,
            } => {
                self.engine
                    .transfer(&from, &to, amount, memo.as_deref())
                    .await?;
            }
            Command::Request {
                requester,
                payer,
                amount,
                memo,
            } => {
                self.engine
                    .create_request(&requester, &payer, amount, memo.as_deref())
                    .await?;
            }
            Command::Approve { request } => {
                self.engine.approve_request(request).await?;
            }
            Command::Deny { request } => {
                self.engine.deny_request(request).await?;
            }
            Command::Split {
                payer,
                recipients,
                total,
                memo,
            } => {
                self.engine
                    .create_split(&payer, &recipients, total, memo.as_deref())
                    .await?;
            }
        }
        Ok(())
    }
}
