use crate::domain::money::Balance;
use crate::domain::wallet::Wallet;
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
struct WalletRow<'a> {
    user_id: &'a str,
    balance: Balance,
    currency: &'a str,
    version: u64,
}

/// Writes a `user_id,balance,currency,version` summary of wallets as CSV.
pub struct WalletWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> WalletWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_wallets<'a>(
        &mut self,
        wallets: impl IntoIterator<Item = &'a Wallet>,
    ) -> Result<(), csv::Error> {
        for wallet in wallets {
            self.writer.serialize(WalletRow {
                user_id: &wallet.user_id,
                balance: wallet.balance,
                currency: wallet.currency.as_str(),
                version: wallet.version,
            })?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
