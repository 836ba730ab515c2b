//! Snapshot export: JSON via serde, CSV via a flat header-plus-records
//! writer. Both schemas are stable and round-trippable; the CSV side covers
//! the per-trade blotter and the scalar summaries.

use serde::{Serialize, de::DeserializeOwned};
use std::fmt::Write as _;
use std::path::Path;

use crate::{
    error::{DeskResult, IoError},
    ledger::{Ledger, LedgerSnapshot},
    metrics::MetricsSnapshot,
};

// ================================================================================================
// JSON
// ================================================================================================

pub fn to_json<T: Serialize>(value: &T) -> DeskResult<String> {
    Ok(serde_json::to_string_pretty(value).map_err(IoError::Json)?)
}

pub fn from_json<T: DeserializeOwned>(json: &str) -> DeskResult<T> {
    Ok(serde_json::from_str(json).map_err(IoError::Json)?)
}

pub fn save_json<T: Serialize>(value: &T, path: impl AsRef<Path>) -> DeskResult<()> {
    let json = to_json(value)?;
    std::fs::write(path, json).map_err(IoError::Io)?;
    Ok(())
}

// ================================================================================================
// CSV
// ================================================================================================

/// Quotes a field when it would break the record structure.
fn csv_field(raw: &str) -> String {
    if raw.contains(',') || raw.contains('"') || raw.contains('\n') {
        format!("\"{}\"", raw.replace('"', "\"\""))
    } else {
        raw.to_string()
    }
}

fn csv_row<I: IntoIterator<Item = String>>(fields: I) -> String {
    fields
        .into_iter()
        .map(|f| csv_field(&f))
        .collect::<Vec<_>>()
        .join(",")
}

/// Per-trade blotter of a ledger, one record per trade in chronological
/// order.
pub fn trades_to_csv(ledger: &Ledger) -> String {
    let mut out = String::from(
        "trade_id,order_id,symbol,direction,order_kind,status,quantity,fill_price,commission,created_at,filled_at,realized\n",
    );
    for trade in ledger.trades() {
        let record = csv_row([
            trade.trade_id.to_string(),
            trade.order_id.to_string(),
            trade.symbol.to_string(),
            trade.direction.to_string(),
            trade.order_kind.to_string(),
            trade.status.to_string(),
            trade.quantity.0.to_string(),
            trade.avg_fill_price.0.to_string(),
            trade.commission.0.to_string(),
            trade.created_at.to_rfc3339(),
            trade.filled_at.map(|t| t.to_rfc3339()).unwrap_or_default(),
            trade.realized.map(|r| r.to_string()).unwrap_or_default(),
        ]);
        let _ = writeln!(out, "{record}");
    }
    out
}

/// Scalar summary of a ledger snapshot (header row plus one record).
pub fn ledger_snapshot_to_csv(snapshot: &LedgerSnapshot) -> String {
    let header = "owner_name,owner_kind,created_at,total_trades,filled_trades,rejections,total_volume,total_commission,buy,sell,sell_short,buy_to_cover";
    let record = csv_row([
        snapshot.owner_name.clone(),
        snapshot.owner_kind.to_string(),
        snapshot.created_at.to_rfc3339(),
        snapshot.total_trades.to_string(),
        snapshot.filled_trades.to_string(),
        snapshot.rejections.to_string(),
        snapshot.total_volume.to_string(),
        snapshot.total_commission.to_string(),
        snapshot.trade_directions.buy.to_string(),
        snapshot.trade_directions.sell.to_string(),
        snapshot.trade_directions.sell_short.to_string(),
        snapshot.trade_directions.buy_to_cover.to_string(),
    ]);
    format!("{header}\n{record}\n")
}

/// Scalar summary of a metrics snapshot (header row plus one record).
pub fn metrics_snapshot_to_csv(snapshot: &MetricsSnapshot) -> String {
    let header = "owner_name,owner_kind,initial_balance,current_balance,total_return,total_return_pct,annualized_return,total_trades,winning_trades,losing_trades,win_rate,profit_factor,average_trade_pnl,largest_win,largest_loss,total_volume,max_drawdown,volatility,downside_deviation,sharpe_ratio,sortino_ratio,calmar_ratio,trade_frequency";
    let record = csv_row([
        snapshot.owner_name.clone(),
        snapshot.owner_kind.to_string(),
        snapshot.initial_balance.to_string(),
        snapshot.current_balance.to_string(),
        snapshot.total_return.to_string(),
        snapshot.total_return_pct.to_string(),
        snapshot.annualized_return.to_string(),
        snapshot.total_trades.to_string(),
        snapshot.winning_trades.to_string(),
        snapshot.losing_trades.to_string(),
        snapshot.win_rate.to_string(),
        snapshot.profit_factor.to_string(),
        snapshot.average_trade_pnl.to_string(),
        snapshot.largest_win.to_string(),
        snapshot.largest_loss.to_string(),
        snapshot.total_volume.to_string(),
        snapshot.max_drawdown.to_string(),
        snapshot.volatility.to_string(),
        snapshot.downside_deviation.to_string(),
        snapshot.sharpe_ratio.to_string(),
        snapshot.sortino_ratio.to_string(),
        snapshot.calmar_ratio.to_string(),
        snapshot.trade_frequency.to_string(),
    ]);
    format!("{header}\n{record}\n")
}

pub fn save_csv(csv: &str, path: impl AsRef<Path>) -> DeskResult<()> {
    std::fs::write(path, csv).map_err(IoError::Io)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        desk::Desk,
        domain::Cash,
        oms::OrderRequest,
        trade::TradeAction,
    };

    fn traded_desk() -> (Desk, crate::domain::StrategyId) {
        let mut desk = Desk::new();
        let strategy = desk
            .create_strategy(None, "S1", "Exporter", Cash(100_000.0))
            .unwrap();
        desk.place_order(
            strategy,
            OrderRequest::market("AAPL", TradeAction::Buy, 10.0, 150.0),
        )
        .unwrap();
        desk.place_order(
            strategy,
            OrderRequest::market("AAPL", TradeAction::Sell, 10.0, 165.0),
        )
        .unwrap();
        (desk, strategy)
    }

    #[test]
    fn ledger_snapshot_json_round_trip() {
        let (desk, strategy) = traded_desk();
        let snapshot = desk.ledger_snapshot(strategy).unwrap();

        let json = to_json(&snapshot).unwrap();
        let back: LedgerSnapshot = from_json(&json).unwrap();
        assert_eq!(back.total_trades, 2);
        assert_eq!(back.symbols_traded, vec!["AAPL"]);
    }

    #[test]
    fn metrics_snapshot_json_round_trip() {
        let (desk, strategy) = traded_desk();
        let snapshot = desk.performance_metrics(strategy, None).unwrap().snapshot();

        let json = to_json(&snapshot).unwrap();
        let back: MetricsSnapshot = from_json(&json).unwrap();
        assert_eq!(back.total_trades, snapshot.total_trades);
        assert_eq!(back.total_return, snapshot.total_return);
    }

    #[test]
    fn trade_blotter_has_one_record_per_trade() {
        let (desk, strategy) = traded_desk();
        let csv = trades_to_csv(desk.ledger(strategy).unwrap());

        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 3, "header plus two records");
        assert!(lines[0].starts_with("trade_id,order_id,symbol"));
        assert!(lines[1].contains("BUY"));
        assert!(lines[2].contains("SELL"));
        assert!(lines[2].ends_with("150"), "closing record carries realized P&L");
    }

    #[test]
    fn snapshot_csv_has_header_and_record() {
        let (desk, strategy) = traded_desk();

        let ledger_csv = ledger_snapshot_to_csv(&desk.ledger_snapshot(strategy).unwrap());
        assert_eq!(ledger_csv.lines().count(), 2);

        let metrics_csv =
            metrics_snapshot_to_csv(&desk.performance_metrics(strategy, None).unwrap().snapshot());
        let mut lines = metrics_csv.lines();
        let header_cols = lines.next().unwrap().split(',').count();
        let record_cols = lines.next().unwrap().split(',').count();
        assert_eq!(header_cols, record_cols);
    }

    #[test]
    fn fields_with_commas_are_quoted() {
        assert_eq!(csv_field("plain"), "plain");
        assert_eq!(csv_field("a,b"), "\"a,b\"");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
    }
}
