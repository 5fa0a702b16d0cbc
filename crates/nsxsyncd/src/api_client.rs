//! HTTP client for the NSX backend API.
//!
//! Thin JSON client implementing [`NsxBackend`]; the backend wire format is
//! otherwise opaque to the rest of the system. A 404 from the backend maps
//! to [`SyncError::NotFound`] so delete paths can treat it as
//! already-consistent.

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;

use nsxsync_common::{
    LportRequest, NsxBackend, SwitchStatus, SyncError, SyncResult, TransportZoneConfig,
};

#[derive(Debug, Deserialize)]
struct UuidResponse {
    uuid: String,
}

#[derive(Debug, Deserialize)]
struct LswitchSummary {
    uuid: String,
    #[serde(default)]
    lport_count: u32,
}

/// JSON-over-HTTP NSX API client.
pub struct NsxApiClient {
    http: Client,
    base_url: String,
}

impl NsxApiClient {
    /// Creates a client for the given API endpoint.
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            http: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Returns the normalized API endpoint.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn expect_ok(op: &str, resource: &str, response: Response) -> SyncResult<Response> {
        if response.status() == StatusCode::NOT_FOUND {
            return Err(SyncError::not_found(resource));
        }
        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::backend_api(op, format!("HTTP {}", status)));
        }
        Ok(response)
    }

    fn send_error(op: &str) -> impl FnOnce(reqwest::Error) -> SyncError + '_ {
        move |e| SyncError::backend_api(op, e.to_string())
    }

    fn lport_body(request: &LportRequest) -> serde_json::Value {
        json!({
            "port_id": request.port_id,
            "tenant_id": request.tenant_id,
            "display_name": request.name,
            "device_id": request.device_id,
            "admin_status_enabled": request.admin_state_up,
            "mac_address": request.mac_address,
            "fixed_ips": request.fixed_ips,
            "port_security_enabled": request.port_security_enabled,
            "security_profiles": request.security_profiles,
            "allowed_address_pairs": request.allowed_address_pairs,
        })
    }
}

#[async_trait]
impl NsxBackend for NsxApiClient {
    async fn create_lswitch(
        &self,
        network_id: &str,
        tenant_id: &str,
        name: &str,
        transport_zones: &[TransportZoneConfig],
        shared: bool,
    ) -> SyncResult<String> {
        let op = "create_lswitch";
        let body = json!({
            "display_name": name,
            "tenant_id": tenant_id,
            "network_id": network_id,
            "transport_zones": transport_zones,
            "shared": shared,
        });
        let response = self
            .http
            .post(self.url("/lswitch"))
            .json(&body)
            .send()
            .await
            .map_err(Self::send_error(op))?;
        let response = Self::expect_ok(op, "lswitch", response).await?;
        let created: UuidResponse = response.json().await.map_err(Self::send_error(op))?;
        Ok(created.uuid)
    }

    async fn rename_lswitch(&self, switch_id: &str, name: &str) -> SyncResult<()> {
        let op = "rename_lswitch";
        let response = self
            .http
            .put(self.url(&format!("/lswitch/{}", switch_id)))
            .json(&json!({ "display_name": name }))
            .send()
            .await
            .map_err(Self::send_error(op))?;
        Self::expect_ok(op, &format!("lswitch {}", switch_id), response).await?;
        Ok(())
    }

    async fn delete_lswitches(&self, network_id: &str, switch_ids: &[String]) -> SyncResult<()> {
        let op = "delete_lswitch";
        let mut missing = Vec::new();
        for switch_id in switch_ids {
            let response = self
                .http
                .delete(self.url(&format!("/lswitch/{}", switch_id)))
                .send()
                .await
                .map_err(Self::send_error(op))?;
            if response.status() == StatusCode::NOT_FOUND {
                missing.push(switch_id.clone());
                continue;
            }
            Self::expect_ok(op, &format!("lswitch {}", switch_id), response).await?;
        }
        // Delete everything we can before reporting the absentees.
        if !missing.is_empty() {
            return Err(SyncError::not_found(format!(
                "lswitches {:?} of network {}",
                missing, network_id
            )));
        }
        Ok(())
    }

    async fn create_lport(&self, switch_id: &str, request: &LportRequest) -> SyncResult<String> {
        let op = "create_lport";
        let response = self
            .http
            .post(self.url(&format!("/lswitch/{}/lport", switch_id)))
            .json(&Self::lport_body(request))
            .send()
            .await
            .map_err(Self::send_error(op))?;
        let response =
            Self::expect_ok(op, &format!("lswitch {}", switch_id), response).await?;
        let created: UuidResponse = response.json().await.map_err(Self::send_error(op))?;
        Ok(created.uuid)
    }

    async fn update_lport(
        &self,
        switch_id: &str,
        lport_id: &str,
        request: &LportRequest,
    ) -> SyncResult<()> {
        let op = "update_lport";
        let response = self
            .http
            .put(self.url(&format!("/lswitch/{}/lport/{}", switch_id, lport_id)))
            .json(&Self::lport_body(request))
            .send()
            .await
            .map_err(Self::send_error(op))?;
        Self::expect_ok(op, &format!("lport {}", lport_id), response).await?;
        Ok(())
    }

    async fn delete_lport(&self, switch_id: &str, lport_id: &str) -> SyncResult<()> {
        let op = "delete_lport";
        let response = self
            .http
            .delete(self.url(&format!("/lswitch/{}/lport/{}", switch_id, lport_id)))
            .send()
            .await
            .map_err(Self::send_error(op))?;
        Self::expect_ok(op, &format!("lport {}", lport_id), response).await?;
        Ok(())
    }

    async fn plug_vif(
        &self,
        switch_id: &str,
        lport_id: &str,
        attachment_kind: &str,
        device_id: &str,
    ) -> SyncResult<()> {
        let op = "plug_vif";
        let body = json!({
            "type": attachment_kind,
            "vif_uuid": device_id,
        });
        let response = self
            .http
            .put(self.url(&format!(
                "/lswitch/{}/lport/{}/attachment",
                switch_id, lport_id
            )))
            .json(&body)
            .send()
            .await
            .map_err(Self::send_error(op))?;
        Self::expect_ok(op, &format!("lport {}", lport_id), response).await?;
        Ok(())
    }

    async fn get_switches(&self, network_id: &str) -> SyncResult<Vec<SwitchStatus>> {
        let op = "get_switches";
        let response = self
            .http
            .get(self.url("/lswitch"))
            .query(&[("network_id", network_id)])
            .send()
            .await
            .map_err(Self::send_error(op))?;
        let response =
            Self::expect_ok(op, &format!("network {}", network_id), response).await?;
        let switches: Vec<LswitchSummary> =
            response.json().await.map_err(Self::send_error(op))?;
        Ok(switches
            .into_iter()
            .map(|ls| SwitchStatus {
                uuid: ls.uuid,
                port_count: ls.lport_count,
            })
            .collect())
    }

    async fn get_security_profile_id(&self, security_group_id: &str) -> SyncResult<String> {
        let op = "get_security_profile_id";
        let response = self
            .http
            .get(self.url("/security-profile"))
            .query(&[("security_group_id", security_group_id)])
            .send()
            .await
            .map_err(Self::send_error(op))?;
        let response = Self::expect_ok(
            op,
            &format!("security profile for {}", security_group_id),
            response,
        )
        .await?;
        let profile: UuidResponse = response.json().await.map_err(Self::send_error(op))?;
        Ok(profile.uuid)
    }
}
