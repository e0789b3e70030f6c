use super::Session;
use crate::{
    client::{CallSpec, ExecutionClient},
    felt::Felt,
};
use anyhow::Result;

/// Reads through a view entrypoint of a recorded contract. No account is needed.
pub async fn view(session: &Session, name: &str, entrypoint: &str, args: &[String]) -> Result<()> {
    let address = session.registry().resolve(session.network(), name)?;
    let ctx = session.connect().await?;
    let call = CallSpec::new(
        address,
        entrypoint,
        args.iter().map(|arg| arg.as_str().into()).collect(),
    );
    let result = ExecutionClient::new(Felt::ZERO)
        .view(&call, &ctx)
        .await?;
    for felt in result {
        println!("{felt}");
    }
    Ok(())
}
