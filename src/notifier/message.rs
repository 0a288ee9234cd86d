//! Alert message rendering.

use crate::models::VolumeSpike;

/// Formats a volume spike into the HTML message delivered to the chat.
pub fn format_alert(spike: &VolumeSpike) -> String {
    format!(
        "<b>🚨 {symbol} VOLUME ALERT 📈</b>\n\
         \n\
         <b>⏱️ Timeframe:</b> {timeframe}\n\
         <b>💹 Current Price:</b> ${price:.2}\n\
         <b>📊 Volume Change:</b> <code>{change:+.2}%</code>\n\
         \n\
         <b>⚠️ INCREASE VOLUME DETECTED</b>",
        symbol = spike.symbol,
        timeframe = spike.timeframe,
        price = spike.last_price,
        change = spike.change_pct,
    )
}
