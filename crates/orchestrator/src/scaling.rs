//! Scaling groups and their instances.
//!
//! A group is pure bookkeeping over VNFRs the NSR creates: it validates
//! requests, tracks each instance's state from its VNFRs and reports the
//! hook actions due when an instance settles. Running the hooks and
//! creating or terminating the VNFRs is up to the NSR.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use nfvo_descriptor::{Nsd, ScalingGroupDescriptor, ScalingTrigger};
use serde::{Deserialize, Serialize};

use crate::collaborator::ScalingHookRequest;
use crate::error::OrchestratorError;
use crate::events::unix_now;
use crate::vnfr::{Vnfr, VnfrState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceState {
    Init,
    VnfInitPhase,
    Running,
    Terminate,
    VnfTerminatePhase,
    Terminated,
    Failed,
}

impl InstanceState {
    fn is_scaling_out(self) -> bool {
        matches!(self, InstanceState::Init | InstanceState::VnfInitPhase)
    }

    fn is_scaling_in(self) -> bool {
        matches!(self, InstanceState::Terminate | InstanceState::VnfTerminatePhase)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceConfigStatus {
    Configuring,
    Configured,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleDirection {
    Out,
    In,
}

// ── Records ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScalingInstanceRecord {
    pub instance_id: u32,
    pub op_status: InstanceState,
    pub config_status: InstanceConfigStatus,
    pub is_default: bool,
    pub vnfrs: Vec<String>,
    pub create_time: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScalingGroupRecord {
    pub scaling_group_name_ref: String,
    pub instance: Vec<ScalingInstanceRecord>,
}

// ── Instances ───────────────────────────────────────────────────────

pub struct ScalingInstance {
    pub id: u32,
    pub is_default: bool,
    pub state: InstanceState,
    pub config_status: InstanceConfigStatus,
    pub vnfrs: Vec<Arc<Vnfr>>,
    pub create_time: i64,
    post_hook_scheduled: bool,
}

impl ScalingInstance {
    fn new(id: u32, is_default: bool) -> Self {
        ScalingInstance {
            id,
            is_default,
            state: InstanceState::Init,
            config_status: InstanceConfigStatus::Configuring,
            vnfrs: Vec::new(),
            create_time: unix_now(),
            post_hook_scheduled: false,
        }
    }

    fn to_record(&self) -> ScalingInstanceRecord {
        ScalingInstanceRecord {
            instance_id: self.id,
            op_status: self.state,
            config_status: self.config_status,
            is_default: self.is_default,
            vnfrs: self.vnfrs.iter().map(|v| v.id().to_string()).collect(),
            create_time: self.create_time,
        }
    }
}

/// Work that falls due when an instance settles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScalingAction {
    /// Every VNFR of the instance is READY.
    PostScaleOut { group: String, instance_id: u32 },
    /// Every VNFR of the instance is gone; run the hook and drop it.
    PostScaleIn { group: String, instance_id: u32 },
}

// ── Groups ──────────────────────────────────────────────────────────

pub struct ScalingGroup {
    descriptor: ScalingGroupDescriptor,
    instances: BTreeMap<u32, ScalingInstance>,
}

impl ScalingGroup {
    pub fn new(descriptor: ScalingGroupDescriptor) -> Self {
        ScalingGroup {
            descriptor,
            instances: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn descriptor(&self) -> &ScalingGroupDescriptor {
        &self.descriptor
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn instance(&self, id: u32) -> Option<&ScalingInstance> {
        self.instances.get(&id)
    }

    pub fn instance_mut(&mut self, id: u32) -> Option<&mut ScalingInstance> {
        self.instances.get_mut(&id)
    }

    pub fn instances(&self) -> impl Iterator<Item = &ScalingInstance> {
        self.instances.values()
    }

    /// Whether an instance is currently being added or removed.
    pub fn direction(&self) -> Option<ScaleDirection> {
        if self.instances.values().any(|i| i.state.is_scaling_out()) {
            Some(ScaleDirection::Out)
        } else if self.instances.values().any(|i| i.state.is_scaling_in()) {
            Some(ScaleDirection::In)
        } else {
            None
        }
    }

    pub fn is_scaling(&self) -> bool {
        self.direction().is_some()
    }

    /// The next free instance id: one past the highest, starting at 1.
    pub fn next_instance_id(&self) -> u32 {
        self.instances.keys().next_back().map_or(1, |id| id + 1)
    }

    /// Check a scale-out request against this group and pick its id.
    pub fn validate_scale_out(&self, instance_id: Option<u32>) -> Result<u32, OrchestratorError> {
        let id = instance_id.unwrap_or_else(|| self.next_instance_id());
        if self.instances.contains_key(&id) {
            return Err(OrchestratorError::ScalingOperation {
                message: format!("instance {} already exists in {}", id, self.name()),
            });
        }
        if self.instances.len() as u32 >= self.descriptor.max_instance_count {
            return Err(OrchestratorError::ScalingOperation {
                message: format!("Max instances for {} reached", self.name()),
            });
        }
        Ok(id)
    }

    /// Check a scale-in request against this group.
    pub fn validate_scale_in(&self, instance_id: u32) -> Result<(), OrchestratorError> {
        match self.instances.get(&instance_id) {
            None => Err(OrchestratorError::ScalingOperation {
                message: format!("instance {} not found in {}", instance_id, self.name()),
            }),
            Some(i) if i.is_default => Err(OrchestratorError::ScalingOperation {
                message: format!(
                    "instance {} of {} is a default instance and cannot be removed",
                    instance_id,
                    self.name()
                ),
            }),
            Some(i) if i.state.is_scaling_in() || i.state == InstanceState::Terminated => {
                Err(OrchestratorError::ScalingOperation {
                    message: format!(
                        "instance {} of {} is already being removed",
                        instance_id,
                        self.name()
                    ),
                })
            }
            Some(_) => Ok(()),
        }
    }

    pub fn add_instance(&mut self, id: u32, is_default: bool) -> &mut ScalingInstance {
        self.instances
            .entry(id)
            .or_insert_with(|| ScalingInstance::new(id, is_default))
    }

    pub fn remove_instance(&mut self, id: u32) -> Option<ScalingInstance> {
        self.instances.remove(&id)
    }

    /// Every VNFR of every instance.
    pub fn vnfrs(&self) -> Vec<Arc<Vnfr>> {
        self.instances
            .values()
            .flat_map(|i| i.vnfrs.iter().cloned())
            .collect()
    }

    /// Whether a VNFR belongs to an instance that already ended FAILED.
    /// Such VNFRs no longer decide the NS state.
    pub fn is_confined(&self, vnfr_id: &str) -> bool {
        self.instances
            .values()
            .any(|i| i.state == InstanceState::Failed && i.vnfrs.iter().any(|v| v.id() == vnfr_id))
    }

    /// Move instances on from their VNFRs' states and collect the hook
    /// actions that fall due. Each action is reported once.
    pub fn refresh(&mut self) -> Vec<ScalingAction> {
        let group = self.descriptor.name.clone();
        let mut actions = Vec::new();
        for instance in self.instances.values_mut() {
            match instance.state {
                InstanceState::VnfInitPhase => {
                    let states: Vec<VnfrState> = instance.vnfrs.iter().map(|v| v.state()).collect();
                    if states.iter().any(|s| *s == VnfrState::Failed) {
                        instance.state = InstanceState::Failed;
                        instance.config_status = InstanceConfigStatus::Failed;
                    } else if states.iter().all(|s| *s == VnfrState::Ready) {
                        instance.state = InstanceState::Running;
                        if !instance.post_hook_scheduled {
                            instance.post_hook_scheduled = true;
                            actions.push(ScalingAction::PostScaleOut {
                                group: group.clone(),
                                instance_id: instance.id,
                            });
                        }
                    }
                }
                InstanceState::VnfTerminatePhase => {
                    if instance
                        .vnfrs
                        .iter()
                        .all(|v| v.state() == VnfrState::Terminated)
                    {
                        instance.state = InstanceState::Terminated;
                        actions.push(ScalingAction::PostScaleIn {
                            group: group.clone(),
                            instance_id: instance.id,
                        });
                    }
                }
                _ => {}
            }
        }
        actions
    }

    pub fn to_record(&self) -> ScalingGroupRecord {
        ScalingGroupRecord {
            scaling_group_name_ref: self.descriptor.name.clone(),
            instance: self.instances.values().map(|i| i.to_record()).collect(),
        }
    }
}

// ── Hooks ───────────────────────────────────────────────────────────

/// Build the hook request for `trigger`, or `None` when the group has no
/// config action for it.
///
/// The primitive's script is resolved against the NSD package directory.
pub fn hook_request(
    nsd: &Nsd,
    nsr_id: &str,
    nsr_name: &str,
    group: &str,
    instance_id: u32,
    trigger: ScalingTrigger,
    vnfrs: &[Arc<Vnfr>],
) -> Result<Option<ScalingHookRequest>, OrchestratorError> {
    let descriptor = nsd.scaling_group(group).ok_or_else(|| {
        OrchestratorError::not_found("scaling group", group)
    })?;
    let Some(action) = descriptor.config_action(trigger) else {
        return Ok(None);
    };
    let primitive = nsd
        .service_primitive(&action.ns_service_primitive_name_ref)
        .ok_or_else(|| {
            OrchestratorError::config(format!(
                "scaling group {} references unknown service primitive {}",
                group, action.ns_service_primitive_name_ref
            ))
        })?;
    let script = primitive.user_defined_script.as_ref().map(|s| {
        let path = PathBuf::from(s);
        match &nsd.package_dir {
            Some(dir) if path.is_relative() => dir.join(path),
            _ => path,
        }
    });
    let vnfrs = vnfrs
        .iter()
        .map(|v| serde_json::to_value(v.to_record()))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| OrchestratorError::internal(format!("vnfr serialization: {}", e)))?;
    Ok(Some(ScalingHookRequest {
        nsr_id: nsr_id.to_string(),
        nsr_name: nsr_name.to_string(),
        scaling_group: group.to_string(),
        instance_id,
        trigger,
        primitive: primitive.name.clone(),
        script,
        vnfrs,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(min: u32, max: u32) -> ScalingGroupDescriptor {
        serde_json::from_value(serde_json::json!({
            "name": "web",
            "min_instance_count": min,
            "max_instance_count": max,
            "vnfd_member": [{ "member_vnf_index_ref": 2, "count": 1 }]
        }))
        .unwrap()
    }

    #[test]
    fn instance_ids_count_up_from_one() {
        let mut group = ScalingGroup::new(descriptor(0, 5));
        assert_eq!(group.validate_scale_out(None).unwrap(), 1);
        group.add_instance(1, false).state = InstanceState::Running;
        group.add_instance(4, false).state = InstanceState::Running;
        assert_eq!(group.validate_scale_out(None).unwrap(), 5);
        assert_eq!(group.validate_scale_out(Some(2)).unwrap(), 2);
    }

    #[test]
    fn scale_out_rejected_at_max_and_for_existing_ids() {
        let mut group = ScalingGroup::new(descriptor(0, 2));
        group.add_instance(1, false).state = InstanceState::Running;
        assert!(group.validate_scale_out(Some(1)).is_err());
        group.add_instance(2, false).state = InstanceState::Running;
        let err = group.validate_scale_out(None).unwrap_err();
        assert_eq!(
            err.to_string(),
            OrchestratorError::ScalingOperation {
                message: "Max instances for web reached".into()
            }
            .to_string()
        );
    }

    #[test]
    fn default_instances_cannot_be_scaled_in() {
        let mut group = ScalingGroup::new(descriptor(1, 3));
        group.add_instance(1, true).state = InstanceState::Running;
        group.add_instance(2, false).state = InstanceState::Running;
        assert!(group.validate_scale_in(1).is_err());
        assert!(group.validate_scale_in(3).is_err());
        group.validate_scale_in(2).unwrap();
    }

    #[test]
    fn direction_follows_instance_states() {
        let mut group = ScalingGroup::new(descriptor(0, 3));
        assert_eq!(group.direction(), None);
        group.add_instance(1, false).state = InstanceState::VnfInitPhase;
        assert_eq!(group.direction(), Some(ScaleDirection::Out));
        group.instance_mut(1).unwrap().state = InstanceState::VnfTerminatePhase;
        assert_eq!(group.direction(), Some(ScaleDirection::In));
        group.instance_mut(1).unwrap().state = InstanceState::Failed;
        assert!(!group.is_scaling());
    }

    #[test]
    fn empty_instance_settles_and_reports_once() {
        let mut group = ScalingGroup::new(descriptor(0, 3));
        group.add_instance(1, false).state = InstanceState::VnfInitPhase;
        assert_eq!(
            group.refresh(),
            vec![ScalingAction::PostScaleOut {
                group: "web".into(),
                instance_id: 1
            }]
        );
        assert_eq!(group.instance(1).unwrap().state, InstanceState::Running);
        assert!(group.refresh().is_empty());
    }

    #[test]
    fn hook_script_resolves_against_package() {
        let nsd: Nsd = serde_json::from_value(serde_json::json!({
            "id": "ns", "name": "ns",
            "package_dir": "/pkg/ns",
            "scaling_group_descriptor": [{
                "name": "web", "max_instance_count": 2,
                "scaling_config_action": [
                    { "trigger": "pre-scale-out", "ns_service_primitive_name_ref": "prep" }
                ]
            }],
            "service_primitive": [{ "name": "prep", "user_defined_script": "scripts/prep.sh" }]
        }))
        .unwrap();
        let req = hook_request(&nsd, "id", "ns", "web", 1, ScalingTrigger::PreScaleOut, &[])
            .unwrap()
            .unwrap();
        assert_eq!(req.script, Some(PathBuf::from("/pkg/ns/scripts/prep.sh")));
        assert!(
            hook_request(&nsd, "id", "ns", "web", 1, ScalingTrigger::PostScaleIn, &[])
                .unwrap()
                .is_none()
        );
    }
}
