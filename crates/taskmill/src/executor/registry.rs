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

//! # Script Registry
//!
//! Global registry mapping the `script` name of a task definition to a
//! constructor producing the [`TaskScript`] to run. Definitions reference
//! scripts by name only; the registry turns that open-world lookup into a
//! closed, testable table. A batch whose script name is absent here fails
//! terminally without retries.

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use super::script::TaskScript;

/// Type alias for the script constructor function stored in the global registry
type ScriptConstructor = Box<dyn Fn() -> Arc<dyn TaskScript> + Send + Sync>;

/// Type alias for the global script registry
type GlobalScriptRegistry = Arc<RwLock<HashMap<String, ScriptConstructor>>>;

/// Global registry of script constructors, keyed by the name task
/// definitions reference in their `script` column.
static GLOBAL_SCRIPT_REGISTRY: Lazy<GlobalScriptRegistry> =
    Lazy::new(|| Arc::new(RwLock::new(HashMap::new())));

/// Register a script constructor function globally.
///
/// Registering the same name twice replaces the previous constructor;
/// the latest registration wins.
///
/// # Arguments
///
/// * `name` - The name task definitions use to reference this script
/// * `constructor` - Function that creates a new instance of the script
///
/// # Example
///
/// ```rust,ignore
/// use taskmill::executor::register_script_constructor;
/// use std::sync::Arc;
///
/// register_script_constructor("sync_orders", || {
///     Arc::new(SyncOrdersScript::new())
/// });
/// ```
pub fn register_script_constructor<F>(name: impl Into<String>, constructor: F)
where
    F: Fn() -> Arc<dyn TaskScript> + Send + Sync + 'static,
{
    let name = name.into();
    let mut registry = GLOBAL_SCRIPT_REGISTRY.write();
    registry.insert(name.clone(), Box::new(constructor));
    tracing::debug!("Registered script constructor: {}", name);
}

/// Register a script instance directly under a name.
pub fn register_script<S: TaskScript + Clone + 'static>(name: impl Into<String>, script: S) {
    register_script_constructor(name, move || Arc::new(script.clone()));
}

/// Get a script instance from the global registry by name.
///
/// # Returns
///
/// * `Some(Arc<dyn TaskScript>)` - If the script exists
/// * `None` - If no script with that name is registered
pub fn get_script(name: &str) -> Option<Arc<dyn TaskScript>> {
    let registry = GLOBAL_SCRIPT_REGISTRY.read();
    registry.get(name).map(|constructor| constructor())
}

/// Check if a script is registered.
pub fn is_script_registered(name: &str) -> bool {
    let registry = GLOBAL_SCRIPT_REGISTRY.read();
    registry.contains_key(name)
}

/// Get all registered script names.
pub fn list_scripts() -> Vec<String> {
    let registry = GLOBAL_SCRIPT_REGISTRY.read();
    registry.keys().cloned().collect()
}
