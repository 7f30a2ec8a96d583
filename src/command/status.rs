use anyhow::Result;

use crate::auth::{describe_store, AuthStore};
use crate::project::Project;

pub async fn run_status() -> Result<()> {
    let store = AuthStore::new(None)?;
    println!("Stored authorizations:");
    print!("{}", describe_store(&store)?);

    match std::env::current_dir().map(|cwd| Project::resolve(&cwd)) {
        Ok(Ok(project)) => {
            println!("Project root: {}", project.root().display());
            println!("Target org:   {}", project.target_org());
        }
        Ok(Err(e)) => println!("No project resolved here: {}", e),
        Err(e) => println!("Could not determine working directory: {}", e),
    }

    Ok(())
}
