/*
 *  Copyright 2025-2026 Colliery Software
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

//! Implementation of the `seed` command: first-run bootstrap of an empty
//! batch store.

use anyhow::Result;
use tracing::info;

use taskmill::dal::DAL;
use taskmill::scripts::seed_first_run;
use taskmill::{Database, EnvMode};

pub async fn run(database_url: &str) -> Result<()> {
    let env = EnvMode::from_env();
    let database = Database::new(database_url, 1);
    let dal = DAL::new(database);

    let created = seed_first_run(&dal, env).await?;
    if created == 0 {
        info!("Batch store already seeded; nothing to do");
    } else {
        info!(created, "Batch store seeded");
    }
    Ok(())
}
