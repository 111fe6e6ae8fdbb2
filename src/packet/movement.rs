//! `MovementController`: per-tick kinematics for packets on a wire
//! (spec §4.5). Off-wire packets just use [`super::Packet::update_position`].

use super::kind::MessengerType;
use super::{AccelProfile, Packet, PacketKind};
use crate::geometry::WirePath;

/// Scalar per-second acceleration applied along the tangent for
/// `Accelerating`/`Decelerating` profiles (spec §4.4: Small/Triangle
/// messengers, Bit packets).
const TANGENT_ACCEL: f32 = 40.0;

/// Active abilities the out-of-scope shop/ability economy may apply between
/// ticks (spec §4.5, §1 Non-goals). The engine exposes the hook but never
/// triggers these itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbilityEffect {
    /// Anahita: zero a packet's noise.
    Anahita,
    /// Atar: suppress shockwaves on a packet for the rest of its journey.
    Atar,
    /// Airyaman: suppress collisions involving a packet.
    Airyaman,
    /// Aergia: zero acceleration on a targeted wire.
    Aergia,
    /// Sisyphus: enables a system move, editing-time only. Targets a
    /// system rather than a packet, so it is granted through
    /// `System::sisyphus_enabled` rather than [`apply_ability`].
    Sisyphus,
    /// Eliphas: realign a packet to the path center (cancel off-path drift).
    Eliphas,
}

pub fn apply_ability(packet: &mut Packet, path: Option<&WirePath>, effect: AbilityEffect) {
    match effect {
        AbilityEffect::Anahita => packet.noise_level = 0.0,
        AbilityEffect::Atar | AbilityEffect::Airyaman | AbilityEffect::Aergia => {
            // Suppression flags are consumed directly by the collision/shockwave
            // and wire-kinematics call sites; nothing to mutate on the packet here.
        }
        AbilityEffect::Sisyphus => {
            // Targets a system, not a packet; see `GameState::grant_sisyphus`.
        }
        AbilityEffect::Eliphas => {
            if let Some(path) = path {
                packet.current_position = path.position_at_progress(packet.path_progress);
            }
        }
    }
}

/// Advance a packet that is on a wire by one tick. `path` is the wire's
/// current geometry (already reflecting the smooth-curves setting); `speed`
/// is the packet's current scalar speed before acceleration is applied this
/// tick.
pub fn advance_on_wire(packet: &mut Packet, path: &WirePath, dt: f32, speed: f32) -> f32 {
    let total_length = path.total_length().max(1.0);
    let accel = accel_profile(packet);
    let next_speed = match accel {
        AccelProfile::Constant => speed,
        AccelProfile::Accelerating => speed + TANGENT_ACCEL * dt,
        AccelProfile::Decelerating => (speed - TANGENT_ACCEL * dt).max(10.0),
    };

    let mut effective_speed = next_speed;
    if matches!(packet.kind, PacketKind::BulkLarge) {
        effective_speed = bulk_large_deflection_speed(packet, next_speed, dt);
    }

    let delta_progress = effective_speed * dt / total_length;
    packet.path_progress = (packet.path_progress + delta_progress).clamp(0.0, 1.0);
    packet.current_position = path.position_at_progress(packet.path_progress);
    let tangent = path.tangent_at_progress(packet.path_progress);
    packet.movement_vector = tangent.scale(effective_speed);
    packet.travel_time += dt;
    if packet.travel_time > packet.max_travel_time {
        packet.active = false;
        packet.lost = Some(crate::error::RuleLoss::TimedOut);
    }
    next_speed
}

fn accel_profile(packet: &Packet) -> AccelProfile {
    match &packet.kind {
        PacketKind::Messenger { kind: MessengerType::Square } => AccelProfile::Constant,
        PacketKind::Messenger { kind: MessengerType::Triangle } => packet.entry_accel,
        PacketKind::Messenger { kind: MessengerType::Small } => packet.entry_accel,
        PacketKind::Protected { current, .. } => match current {
            MessengerType::Square => AccelProfile::Constant,
            _ => packet.entry_accel,
        },
        PacketKind::Bit { .. } => packet.entry_accel,
        _ => AccelProfile::Constant,
    }
}

/// `BulkLarge` deflects perpendicular to its tangent every 50 units of
/// distance travelled (spec §4.4). The deflection nudges the effective
/// speed's perpendicular component for one tick, which the caller folds
/// into the wire-relative progress; since progress is 1D, the nudge is
/// modeled as a momentary speed pulse rather than true off-path motion
/// (bends still pin the path; this is a periodic speed variation).
fn bulk_large_deflection_speed(packet: &mut Packet, base_speed: f32, dt: f32) -> f32 {
    packet.distance_since_deflection += base_speed * dt;
    if packet.distance_since_deflection >= 50.0 {
        packet.distance_since_deflection = 0.0;
        base_speed * 0.85
    } else {
        base_speed
    }
}

/// Entry acceleration profile and base-speed multiplier chosen from port
/// compatibility at the moment a packet is placed onto an output port
/// (spec §4.4): Square is constant-speed, full from a compatible port and
/// half from an incompatible one; Small and Bit accelerate from a
/// compatible port and decelerate from an incompatible one; Triangle is
/// constant from a compatible port and accelerates from an incompatible
/// one.
pub fn accel_profile_for_entry(kind: &PacketKind, compatible: bool) -> (AccelProfile, f32) {
    match kind {
        PacketKind::Messenger { kind: MessengerType::Square } => {
            (AccelProfile::Constant, if compatible { 1.0 } else { 0.5 })
        }
        PacketKind::Messenger { kind: MessengerType::Small } | PacketKind::Bit { .. } => {
            (if compatible { AccelProfile::Accelerating } else { AccelProfile::Decelerating }, 1.0)
        }
        PacketKind::Messenger { kind: MessengerType::Triangle } => {
            (if compatible { AccelProfile::Constant } else { AccelProfile::Accelerating }, 1.0)
        }
        PacketKind::Protected { current, .. } => accel_profile_for_entry(
            &PacketKind::Messenger { kind: *current },
            compatible,
        ),
        _ => (AccelProfile::Constant, 1.0),
    }
}

/// Confidential packets entering an occupied system stagger their arrival
/// by halving movement magnitude for the tick of entry (spec §4.4).
pub fn confidential_occupancy_scale(system_has_others: bool) -> f32 {
    if system_has_others {
        0.5
    } else {
        1.0
    }
}

/// ConfidentialProtected's best-effort target-distance maintenance (spec
/// §4.4): rather than leaving the wire's path, it adjusts its projection
/// onto the tangent (i.e. its speed) toward a target spacing from the
/// nearest other on-network packet — slower when crowded closer than
/// `target_distance`, faster when farther, clamped so a single tick's
/// correction stays bounded.
pub fn confidential_protected_speed_scale(nearest_on_network_distance: Option<f32>, target_distance: f32) -> f32 {
    let Some(distance) = nearest_on_network_distance else { return 1.0 };
    if target_distance <= 0.0 {
        return 1.0;
    }
    (distance / target_distance).clamp(0.5, 1.5)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point2D;
    use crate::ids::PacketId;

    #[test]
    fn square_messenger_moves_at_constant_speed_along_wire() {
        let path = WirePath::build(Point2D::new(0.0, 0.0), &[], Point2D::new(200.0, 0.0), true);
        let mut packet = Packet::new_messenger(PacketId(0), MessengerType::Square, Point2D::new(0.0, 0.0), Point2D::new(200.0, 0.0));
        let speed = advance_on_wire(&mut packet, &path, 0.5, packet.base_speed);
        assert!((speed - packet.base_speed).abs() < 0.01);
        assert!(packet.path_progress > 0.0);
    }

    #[test]
    fn small_messenger_accelerates_from_compatible_entry() {
        let path = WirePath::build(Point2D::new(0.0, 0.0), &[], Point2D::new(200.0, 0.0), true);
        let mut packet = Packet::new_messenger(PacketId(0), MessengerType::Small, Point2D::new(0.0, 0.0), Point2D::new(200.0, 0.0));
        packet.entry_accel = AccelProfile::Accelerating;
        let s0 = packet.base_speed;
        let s1 = advance_on_wire(&mut packet, &path, 1.0, s0);
        assert!(s1 > s0);
    }

    #[test]
    fn confidential_protected_slows_down_when_crowded_closer_than_target() {
        let scale = confidential_protected_speed_scale(Some(10.0), 60.0);
        assert!(scale < 1.0);
    }

    #[test]
    fn confidential_protected_speeds_up_when_farther_than_target() {
        let scale = confidential_protected_speed_scale(Some(200.0), 60.0);
        assert!(scale > 1.0);
    }

    #[test]
    fn confidential_protected_holds_steady_with_no_other_packets() {
        assert_eq!(confidential_protected_speed_scale(None, 60.0), 1.0);
    }
}
