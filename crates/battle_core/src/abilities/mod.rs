//! Ability and skill state machine.
//!
//! Every combat unit carries an [`AbilitiesComponent`] with three ability
//! groups (attack, omega, innate). A running [`AbilityState`] walks through
//! its skills in order; each [`SkillState`] derives its timers from a share
//! of the ability's total duration and moves through
//! `None -> Waiting -> Deploying -> Channeling -> Finished`.
//!
//! The state machine never deactivates itself: once an ability is finished
//! the owner (the tick driver) deactivates it through the component.

mod ability_state;
mod component;
mod selection;
mod skill_state;

pub use ability_state::{AbilityState, ActivatorContext, EffectRef};
pub use component::{AbilitiesComponent, AbilitiesState, AbilityGroup, AbilityRef, AbilityTypeStats};
pub use selection::{AbilitySelector, SelectionPolicy};
pub use skill_state::{SkillState, SkillStateType, SkillTargetingState};

pub use crate::data::AbilityType;
