pub mod reset;
pub mod server;
pub mod setup;

use anyhow::Result;

#[derive(Debug)]
pub enum Action {
    Server(server::Args),
    Setup(setup::Args),
    Reset(reset::Args),
}

impl Action {
    /// # Errors
    /// Returns an error if the selected action fails.
    pub async fn execute(self) -> Result<()> {
        match self {
            Self::Server(args) => server::handle(args).await,
            Self::Setup(args) => setup::handle(args).await,
            Self::Reset(args) => reset::handle(args).await,
        }
    }
}
