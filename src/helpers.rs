//! Navigation helpers usable as function steps.

use serde_json::{json, Value};
use url::Url;

use crate::collab::Automation;
use crate::errors::{unsourced, ErrorKind, SpecError};
use crate::runtime::{callable, Callable};

/// Navigate the page. `/x` is resolved against the page's origin, anything
/// else is appended to the current URL.
pub fn goto(target: impl Into<String>) -> Callable {
    let target = target.into();
    callable(move |page| {
        let current = page.invoke(&["url".to_string()], &[])?;
        let url = resolve(&current, &target)?;
        page.invoke(&["goto".to_string()], &[json!(url.as_str())])?;
        Ok(())
    })
}

/// Change the URL through the history API, without a navigation.
pub fn goto_state(target: impl Into<String>) -> Callable {
    let target = target.into();
    callable(move |page| {
        page.invoke(
            &["evaluate".to_string()],
            &[json!("url => window.history.pushState({}, '', url)"), json!(target)],
        )?;
        Ok(())
    })
}

/// Pause in the page's debugger.
pub fn breakpoint() -> Callable {
    callable(|page: &mut dyn Automation| {
        page.invoke(
            &["evaluate".to_string()],
            &[json!("// You are here because of breakpoint command\ndebugger")],
        )?;
        Ok(())
    })
}

fn resolve(current: &Value, target: &str) -> Result<Url, SpecError> {
    let invalid = |reason: String| {
        unsourced(
            "page",
            ErrorKind::Forwarding {
                path: "url".to_string(),
                reason,
            },
        )
    };
    let current = current
        .as_str()
        .ok_or_else(|| invalid(format!("returned {} instead of a URL", current)))?;
    let mut url = Url::parse(current).map_err(|e| invalid(e.to_string()))?;

    if target.starts_with('/') {
        return url.join(target).map_err(|e| invalid(e.to_string()));
    }
    url.path_segments_mut()
        .map_err(|_| invalid(format!("cannot append to {}", current)))?
        .pop_if_empty()
        .extend(target.split('/').filter(|s| !s.is_empty()));
    Ok(url)
}
