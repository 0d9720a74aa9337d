//! Record store paths used by the orchestrator.

pub const NS_INSTANCE_CONFIG: &str = "ns-instance-config/";
pub const NS_INSTANCE_OPDATA: &str = "ns-instance-opdata/";
pub const VNFR_CATALOG: &str = "vnfr-catalog/";
pub const VLR_CATALOG: &str = "vlr-catalog/";
pub const VNFFGR: &str = "vnffgr/";
pub const VDU_EVENT: &str = "resource-mgmt/vdu-event/";
pub const VDUR_CONSOLE: &str = "vdur-console/";

pub fn ns_instance_config(nsr_id: &str) -> String {
    format!("{}{}", NS_INSTANCE_CONFIG, nsr_id)
}

pub fn ns_instance_opdata(nsr_id: &str) -> String {
    format!("{}{}", NS_INSTANCE_OPDATA, nsr_id)
}

pub fn vnfr(vnfr_id: &str) -> String {
    format!("{}{}", VNFR_CATALOG, vnfr_id)
}

pub fn vlr(vlr_id: &str) -> String {
    format!("{}{}", VLR_CATALOG, vlr_id)
}

pub fn vnffgr(vnffgr_id: &str) -> String {
    format!("{}{}", VNFFGR, vnffgr_id)
}

pub fn vdu_event(request_id: &str) -> String {
    format!("{}{}", VDU_EVENT, request_id)
}

pub fn vdur_console(vdur_id: &str) -> String {
    format!("{}{}", VDUR_CONSOLE, vdur_id)
}

/// The record id at the end of `path`, if `path` lies under `prefix`.
pub fn id_from(prefix: &str, path: &str) -> Option<String> {
    path.strip_prefix(prefix)
        .filter(|id| !id.is_empty() && !id.contains('/'))
        .map(str::to_string)
}
