// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Vault Approval Server contributors

//! Human approval surface.
//!
//! `GET /approve/{id}` renders the one page where real secret values are
//! shown, on the trusted origin, so the human signs what they see. The
//! JSON endpoints below it drive the WebAuthn ceremony from that page.

use axum::{
    extract::{Path, State},
    response::Html,
    Json,
};

use crate::error::Error;
use crate::models::{ApprovalResponse, ChallengeRequest, ChallengeResponse, DenyResponse};
use crate::ops::OpState;
use crate::state::AppState;
use crate::webauthn::AssertionRequest;

#[utoipa::path(
    post,
    path = "/v1/webauthn/challenge",
    request_body = ChallengeRequest,
    tag = "Approval",
    responses(
        (status = 200, body = ChallengeResponse),
        (status = 409, description = "Operation is not pending")
    )
)]
pub async fn webauthn_challenge(
    State(state): State<AppState>,
    Json(request): Json<ChallengeRequest>,
) -> Result<Json<ChallengeResponse>, Error> {
    let challenge = state.engine.request_approval(&request.operation_id)?;
    Ok(Json(ChallengeResponse {
        challenge: challenge.challenge,
        rp_id: state.config.rp_id.clone(),
        origin: state.config.approval_origin.clone(),
        credential_ids: challenge.credential_ids,
    }))
}

#[utoipa::path(
    post,
    path = "/v1/operations/{operation_id}/approve",
    params(("operation_id" = String, Path, description = "Operation id")),
    request_body = AssertionRequest,
    tag = "Approval",
    responses(
        (status = 200, body = ApprovalResponse),
        (status = 401, description = "Assertion failed verification"),
        (status = 409, description = "Operation is not pending")
    )
)]
pub async fn approve_operation(
    State(state): State<AppState>,
    Path(operation_id): Path<String>,
    Json(assertion): Json<AssertionRequest>,
) -> Result<Json<ApprovalResponse>, Error> {
    let approval = state.engine.submit_approval(&operation_id, &assertion)?;
    Ok(Json(ApprovalResponse {
        operation_id,
        state: OpState::Approved,
        device_label: approval.device_label,
    }))
}

#[utoipa::path(
    post,
    path = "/v1/operations/{operation_id}/deny",
    params(("operation_id" = String, Path, description = "Operation id")),
    tag = "Approval",
    responses(
        (status = 200, body = DenyResponse),
        (status = 409, description = "Operation is not pending")
    )
)]
pub async fn deny_operation(
    State(state): State<AppState>,
    Path(operation_id): Path<String>,
) -> Result<Json<DenyResponse>, Error> {
    state.engine.deny(&operation_id)?;
    Ok(Json(DenyResponse {
        operation_id,
        state: OpState::Denied,
    }))
}

fn escape_html(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

/// Index of live operations, linking to their approval pages.
#[utoipa::path(
    get,
    path = "/approve",
    tag = "Approval",
    responses((status = 200, description = "Pending-operations index", body = String, content_type = "text/html"))
)]
pub async fn approval_index(State(state): State<AppState>) -> Result<Html<String>, Error> {
    let rows: String = state
        .engine
        .list_operations()?
        .into_iter()
        .map(|op| {
            let link = if op.state == OpState::Pending {
                format!(r#"<a href="/approve/{}">review</a>"#, escape_html(&op.id))
            } else {
                String::new()
            };
            format!(
                "<tr><td><code>{}</code></td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
                escape_html(&op.id),
                op.kind.name(),
                escape_html(&op.target),
                op.state.name(),
                link,
            )
        })
        .collect();

    Ok(Html(format!(
        r#"<!DOCTYPE html>
<html><head><meta charset="utf-8"><title>Pending approvals</title></head>
<body style="font-family: system-ui; max-width: 720px; margin: 3rem auto;">
<h1>Operations</h1>
<table border="1" cellpadding="6" style="border-collapse: collapse;">
<tr><th>Id</th><th>Kind</th><th>Target</th><th>State</th><th></th></tr>{rows}
</table>
</body></html>"#
    )))
}

/// Approval page for one operation.
///
/// Payload values are rendered in the clear - this page exists so the
/// human can see exactly what the assistant asked to store before
/// touching the authenticator.
#[utoipa::path(
    get,
    path = "/approve/{operation_id}",
    params(("operation_id" = String, Path, description = "Operation id")),
    tag = "Approval",
    responses(
        (status = 200, description = "Approval page", body = String, content_type = "text/html"),
        (status = 404, description = "Unknown operation")
    )
)]
pub async fn approval_page(
    State(state): State<AppState>,
    Path(operation_id): Path<String>,
) -> Result<Html<String>, Error> {
    let op = state.engine.operation(&operation_id)?;

    if op.state != OpState::Pending {
        return Ok(Html(format!(
            r#"<!DOCTYPE html>
<html><head><meta charset="utf-8"><title>Operation {id}</title></head>
<body style="font-family: system-ui; max-width: 640px; margin: 3rem auto;">
<h1>Operation {state}</h1>
<p>Operation <code>{id}</code> is <strong>{state}</strong> and can no longer be approved here.</p>
</body></html>"#,
            id = escape_html(&op.id),
            state = op.state.name(),
        )));
    }

    let rows: String = op
        .payload
        .iter()
        .map(|(key, value)| {
            format!(
                "<tr><td><code>{}</code></td><td><code>{}</code></td></tr>",
                escape_html(key),
                escape_html(value)
            )
        })
        .collect();

    let warnings = if op.warnings.is_empty() {
        String::new()
    } else {
        let items: String = op
            .warnings
            .iter()
            .map(|w| format!("<li>{}</li>", escape_html(w)))
            .collect();
        format!(
            r#"<div style="border: 2px solid #c62828; padding: 1rem; margin: 1rem 0;">
<strong>&#9888; Suspicious content detected</strong><ul>{items}</ul></div>"#
        )
    };

    let registration = if state.engine.registry().has_credentials() {
        String::new()
    } else {
        r#"<p><strong>No approval device registered yet.</strong>
<button onclick="registerDevice()">Register this device</button></p>"#
            .to_string()
    };

    Ok(Html(format!(
        r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>Approve operation</title></head>
<body style="font-family: system-ui; max-width: 640px; margin: 3rem auto;">
<h1>Approval required</h1>
<p>An assistant session wants to run <strong>{kind}</strong> against
<strong>{target}</strong>. Review the values below; approving releases them
for exactly one execution.</p>
{warnings}
<table border="1" cellpadding="6" style="border-collapse: collapse;">
<tr><th>Key</th><th>Value</th></tr>{rows}
</table>
{registration}
<p>
<button onclick="approve()">Approve with security key</button>
<button onclick="deny()">Deny</button>
</p>
<p id="status"></p>
<script>
const OPERATION_ID = "{id}";

function b64uToBuf(s) {{
  const pad = "=".repeat((4 - s.length % 4) % 4);
  const raw = atob(s.replace(/-/g, "+").replace(/_/g, "/") + pad);
  return Uint8Array.from(raw, c => c.charCodeAt(0));
}}
function bufToB64u(buf) {{
  const bytes = new Uint8Array(buf);
  let raw = "";
  for (const b of bytes) raw += String.fromCharCode(b);
  return btoa(raw).replace(/\+/g, "-").replace(/\//g, "_").replace(/=+$/, "");
}}
function setStatus(text) {{ document.getElementById("status").textContent = text; }}

async function registerDevice() {{
  const options = await (await fetch("/v1/webauthn/register/options", {{method: "POST"}})).json();
  const credential = await navigator.credentials.create({{publicKey: {{
    challenge: b64uToBuf(options.challenge),
    rp: {{id: options.rp_id, name: "Vault Approval"}},
    user: {{id: crypto.getRandomValues(new Uint8Array(16)), name: "approver", displayName: "Approver"}},
    pubKeyCredParams: [{{alg: -7, type: "public-key"}}],
    attestation: "none",
  }}}});
  const spki = new Uint8Array(credential.response.getPublicKey());
  const authData = new Uint8Array(credential.response.getAuthenticatorData());
  const counter = new DataView(authData.buffer, 33, 4).getUint32(0);
  const body = {{
    credential_id: bufToB64u(credential.rawId),
    device_label: prompt("Name this device", "security key") || "security key",
    attestation_format: "none",
    public_key: bufToB64u(spki.slice(-65)),
    client_data_json: bufToB64u(credential.response.clientDataJSON),
    sign_count: counter,
  }};
  const res = await fetch("/v1/webauthn/register", {{
    method: "POST", headers: {{"Content-Type": "application/json"}}, body: JSON.stringify(body),
  }});
  setStatus(res.ok ? "Device registered, you can approve now." : "Registration failed.");
  if (res.ok) location.reload();
}}

async function approve() {{
  const options = await (await fetch("/v1/webauthn/challenge", {{
    method: "POST", headers: {{"Content-Type": "application/json"}},
    body: JSON.stringify({{operation_id: OPERATION_ID}}),
  }})).json();
  const assertion = await navigator.credentials.get({{publicKey: {{
    challenge: b64uToBuf(options.challenge),
    rpId: options.rp_id,
    allowCredentials: options.credential_ids.map(id => ({{id: b64uToBuf(id), type: "public-key"}})),
    userVerification: "preferred",
  }}}});
  const body = {{
    credential_id: bufToB64u(assertion.rawId),
    client_data_json: bufToB64u(assertion.response.clientDataJSON),
    authenticator_data: bufToB64u(assertion.response.authenticatorData),
    signature: bufToB64u(assertion.response.signature),
  }};
  const res = await fetch(`/v1/operations/${{OPERATION_ID}}/approve`, {{
    method: "POST", headers: {{"Content-Type": "application/json"}}, body: JSON.stringify(body),
  }});
  if (res.ok) {{
    setStatus("Approved. The assistant can execute the operation now.");
  }} else {{
    const err = await res.json();
    setStatus(`Approval failed: ${{err.error}}`);
  }}
}}

async function deny() {{
  const res = await fetch(`/v1/operations/${{OPERATION_ID}}/deny`, {{method: "POST"}});
  setStatus(res.ok ? "Denied." : "Deny failed.");
}}
</script>
</body>
</html>"#,
        kind = op.kind.name(),
        target = escape_html(&op.target),
        id = escape_html(&op.id),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::tests::{approve_via_engine, test_state};
    use crate::ops::OpKind;
    use std::collections::BTreeMap;

    fn queue_op(state: &AppState, secrets: &[(&str, &str)]) -> String {
        let map: BTreeMap<String, String> = secrets
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        state
            .engine
            .create_operation("sess-1", OpKind::WriteSecrets, "svc", &map)
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn page_shows_real_values_and_warnings() {
        let (_temp, state) = test_state();
        let id = queue_op(&state, &[("HOOK", "x$(whoami)"), ("API_KEY", "sk-real")]);

        let Html(page) = approval_page(State(state), Path(id))
            .await
            .expect("page renders");
        assert!(page.contains("sk-real"));
        assert!(page.contains("Suspicious content detected"));
        assert!(page.contains("command substitution"));
    }

    #[tokio::test]
    async fn index_lists_operations_without_values() {
        let (_temp, state) = test_state();
        let id = queue_op(&state, &[("API_KEY", "sk-hyper-secret")]);

        let Html(page) = approval_index(State(state)).await.expect("index renders");
        assert!(page.contains(&id));
        assert!(page.contains("pending"));
        assert!(!page.contains("sk-hyper-secret"));
    }

    #[tokio::test]
    async fn page_escapes_values() {
        let (_temp, state) = test_state();
        let id = queue_op(&state, &[("K", "<script>alert(1)</script>")]);

        let Html(page) = approval_page(State(state), Path(id)).await.unwrap();
        assert!(!page.contains("<script>alert(1)</script>"));
        assert!(page.contains("&lt;script&gt;"));
    }

    #[tokio::test]
    async fn page_reports_terminal_states() {
        let (_temp, state) = test_state();
        let id = queue_op(&state, &[("K", "v")]);
        state.engine.deny(&id).unwrap();

        let Html(page) = approval_page(State(state), Path(id)).await.unwrap();
        assert!(page.contains("denied"));
        assert!(!page.contains("Approve with security key"));
    }

    #[tokio::test]
    async fn unknown_operation_is_404() {
        let (_temp, state) = test_state();
        let err = approval_page(State(state), Path("nope".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound("operation")));
    }

    #[tokio::test]
    async fn challenge_requires_pending_operation() {
        let (_temp, state) = test_state();
        let id = queue_op(&state, &[("K", "v")]);
        approve_via_engine(&state, &id);

        let err = webauthn_challenge(
            State(state),
            Json(ChallengeRequest { operation_id: id }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::OperationNotPending));
    }

    #[tokio::test]
    async fn deny_endpoint_transitions_operation() {
        let (_temp, state) = test_state();
        let id = queue_op(&state, &[("K", "v")]);

        let Json(denied) = deny_operation(State(state.clone()), Path(id.clone()))
            .await
            .expect("deny succeeds");
        assert_eq!(denied.state, OpState::Denied);

        let err = deny_operation(State(state), Path(id)).await.unwrap_err();
        assert!(matches!(err, Error::OperationNotPending));
    }
}
