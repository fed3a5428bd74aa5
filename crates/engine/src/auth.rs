//! Login sequence run once per session, before any case

use std::time::Duration;

use stepwise_common::AuthenticationConfig;
use tracing::{debug, info, warn};

use crate::browser::{LoadState, Page};
use crate::error::{RunError, RunResult};

/// Open the login page, fill credentials, submit, and wait for the page to settle.
///
/// Each field uses the first locator in its list that accepts the operation.
pub async fn authenticate(
    page: &dyn Page,
    auth: &AuthenticationConfig,
    target_url: &str,
    navigation_timeout: Duration,
) -> RunResult<()> {
    let login_url = auth.login_url.as_deref().unwrap_or(target_url);
    info!("Authenticating as {} at {}", auth.username, login_url);

    page.goto(login_url, LoadState::DomContentLoaded, navigation_timeout)
        .await
        .map_err(|e| RunError::Authentication(format!("could not open {}: {}", login_url, e)))?;

    let timeout = auth.timeout();
    fill_first(page, "username", &auth.username_locators, &auth.username, timeout).await?;
    fill_first(page, "password", &auth.password_locators, &auth.password, timeout).await?;

    let mut submitted = false;
    for locator in &auth.submit_locators {
        match page.click(locator, timeout).await {
            Ok(()) => {
                submitted = true;
                break;
            }
            Err(e) => debug!("Submit locator {} failed: {}", locator, e),
        }
    }
    if !submitted {
        return Err(RunError::Authentication("no submit control matched".to_string()));
    }

    // Some apps keep polling after login; a page that never idles is not fatal
    if let Err(e) = page.wait_for_load(LoadState::NetworkIdle, navigation_timeout).await {
        warn!("Page did not settle after login: {}", e);
    }
    info!("Authenticated");
    Ok(())
}

async fn fill_first(
    page: &dyn Page,
    field: &str,
    locators: &[String],
    value: &str,
    timeout: Duration,
) -> RunResult<()> {
    for locator in locators {
        match page.fill(locator, value, timeout).await {
            Ok(()) => {
                debug!("Filled {} via {}", field, locator);
                return Ok(());
            }
            Err(e) => debug!("{} locator {} failed: {}", field, locator, e),
        }
    }
    Err(RunError::Authentication(format!("no {} field matched", field)))
}
