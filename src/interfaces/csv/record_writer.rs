use crate::domain::transaction::TransactionRecord;
use crate::error::Result;
use rust_decimal::Decimal;
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
struct HistoryRow<'a> {
    id: u64,
    timestamp: String,
    kind: &'a str,
    initiator: &'a str,
    target: Option<&'a str>,
    amount: Decimal,
    status: String,
    request: Option<u64>,
    memo: Option<&'a str>,
}

/// Writes a transaction history as CSV, amounts in major units.
pub struct RecordWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> RecordWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_records<'a>(
        &mut self,
        records: impl IntoIterator<Item = &'a TransactionRecord>,
    ) -> Result<()> {
        for record in records {
            self.writer.serialize(HistoryRow {
                id: record.id.0,
                timestamp: record.timestamp.to_rfc3339(),
                kind: record.kind.as_str(),
                initiator: record.initiator.as_str(),
                target: record.target.as_ref().map(|t| t.as_str()),
                amount: record.amount.to_major(),
                status: record.status.to_string(),
                request: record.request.map(|r| r.0),
                memo: record.memo.as_deref(),
            })?;
        }
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::account::Amount;
    use crate::domain::request::RequestId;
    use crate::domain::transaction::{NewRecord, TransactionId, TransactionKind, TransactionStatus};
    use chrono::Utc;

    #[test]
    fn test_writes_history_rows() {
        let record = NewRecord::new(
            TransactionKind::RequestSent,
            "alice".into(),
            Some("bob".into()),
            Amount::new(500).unwrap(),
            TransactionStatus::Pending,
        )
        .with_request(RequestId(4))
        .into_record(TransactionId(1), Utc::now())
        .unwrap();

        let mut out = Vec::new();
        RecordWriter::new(&mut out).write_records([&record]).unwrap();

        let text = String::from_utf8(out).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("id,timestamp,kind,initiator,target,amount,status,request,memo")
        );
        let row = lines.next().unwrap();
        assert!(row.starts_with("1,"));
        assert!(row.ends_with(",request_sent,alice,bob,5.00,pending,4,"));
    }
}
