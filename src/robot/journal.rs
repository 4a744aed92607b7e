use std::{
    collections::{BTreeSet, HashMap},
    time::Duration,
};

use enumset::EnumSet;

use crate::{
    labware::{LabwareAlias, Location, Mount},
    prelude::*,
    quantity::{FlowRate, Microliters, Millimeters},
    robot::{Command, Instrument, Robot},
};

/// Volumes closer than that are the same volume.
const TOLERANCE: Microliters = Microliters(1e-6);

/// Dry-run robot: records the commands and checks that they are physically possible.
#[must_use]
#[derive(Default)]
pub struct Journal {
    commands: Vec<Command>,
    labware: BTreeSet<LabwareAlias>,
    tip_capacities: HashMap<Mount, Microliters>,
    tips: EnumSet<Mount>,

    /// Liquid currently held in each tip.
    loaded: HashMap<Mount, Microliters>,

    n_tips_used: usize,
}

impl Journal {
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn into_commands(self) -> Vec<Command> {
        self.commands
    }

    pub const fn n_tips_used(&self) -> usize {
        self.n_tips_used
    }

    /// Liquid currently held in the tip on the mount.
    pub fn loaded(&self, mount: Mount) -> Microliters {
        self.loaded.get(&mount).copied().unwrap_or(Microliters::ZERO)
    }

    fn ensure_instrument(&self, mount: Mount) -> Result<Microliters> {
        self.tip_capacities
            .get(&mount)
            .copied()
            .with_context(|| format!("no instrument is loaded on the {mount:?} mount"))
    }

    fn ensure_tip(&self, mount: Mount) -> Result {
        self.ensure_instrument(mount)?;
        ensure!(self.tips.contains(mount), "the {mount:?} pipette has no tip");
        Ok(())
    }

    fn ensure_labware(&self, location: &Location) -> Result {
        ensure!(
            self.labware.contains(&location.labware),
            "labware `{}` is not loaded",
            location.labware,
        );
        Ok(())
    }
}

impl Robot for Journal {
    fn load_labware(&mut self, alias: &LabwareAlias, kind: &str, slot: u8) -> Result {
        ensure!(self.labware.insert(alias.clone()), "labware `{alias}` is loaded twice");
        self.commands.push(Command::LoadLabware {
            alias: alias.clone(),
            kind: kind.to_owned(),
            slot,
        });
        Ok(())
    }

    fn load_instrument(&mut self, instrument: &Instrument) -> Result {
        ensure!(
            !self.tip_capacities.contains_key(&instrument.mount),
            "the {:?} mount is already taken",
            instrument.mount,
        );
        for tip_rack in &instrument.tip_racks {
            ensure!(self.labware.contains(tip_rack), "tip rack `{tip_rack}` is not loaded");
        }
        self.tip_capacities.insert(instrument.mount, instrument.tip_capacity);
        self.commands.push(Command::LoadInstrument {
            kind: instrument.kind.clone(),
            mount: instrument.mount,
            tip_racks: instrument.tip_racks.clone(),
        });
        Ok(())
    }

    fn has_tip(&self, mount: Mount) -> bool {
        self.tips.contains(mount)
    }

    fn pick_up_tip(&mut self, mount: Mount) -> Result {
        self.ensure_instrument(mount)?;
        ensure!(!self.tips.contains(mount), "the {mount:?} pipette already has a tip");
        self.tips.insert(mount);
        self.loaded.insert(mount, Microliters::ZERO);
        self.n_tips_used += 1;
        self.commands.push(Command::PickUpTip { mount });
        Ok(())
    }

    fn drop_tip(&mut self, mount: Mount) -> Result {
        self.ensure_tip(mount)?;
        self.tips.remove(mount);
        self.loaded.remove(&mount);
        self.commands.push(Command::DropTip { mount });
        Ok(())
    }

    fn aspirate(&mut self, mount: Mount, volume: Microliters, location: &Location) -> Result {
        let tip_capacity = self.ensure_instrument(mount)?;
        self.ensure_tip(mount)?;
        self.ensure_labware(location)?;
        ensure!(volume.is_positive(), "cannot aspirate {volume}");
        let loaded = self.loaded(mount) + volume;
        ensure!(
            loaded <= tip_capacity + TOLERANCE,
            "aspirating {volume} would put {loaded} into a {tip_capacity} tip",
        );
        self.loaded.insert(mount, loaded);
        self.commands.push(Command::Aspirate { mount, volume, location: location.clone() });
        Ok(())
    }

    fn dispense(
        &mut self,
        mount: Mount,
        volume: Microliters,
        location: &Location,
        rate: FlowRate,
    ) -> Result {
        self.ensure_tip(mount)?;
        self.ensure_labware(location)?;
        ensure!(volume.is_positive(), "cannot dispense {volume}");
        ensure!(rate.0 > 0.0, "flow rate must be positive, got {rate}");

        // Dispensing more than is held blows the tip out:
        let loaded = (self.loaded(mount) - volume).max(Microliters::ZERO);
        self.loaded.insert(mount, loaded);

        self.commands.push(Command::Dispense { mount, volume, location: location.clone(), rate });
        Ok(())
    }

    fn move_to(&mut self, mount: Mount, location: &Location) -> Result {
        self.ensure_instrument(mount)?;
        self.ensure_labware(location)?;
        self.commands.push(Command::MoveTo { mount, location: location.clone() });
        Ok(())
    }

    fn touch_tip(&mut self, mount: Mount, v_offset: Millimeters, radius: f64) -> Result {
        self.ensure_tip(mount)?;
        ensure!((0.0..=1.0).contains(&radius), "touch radius must be within 0..=1, got {radius}");
        self.commands.push(Command::TouchTip { mount, v_offset, radius });
        Ok(())
    }

    fn delay(&mut self, duration: Duration) -> Result {
        self.commands.push(Command::Delay { seconds: duration.as_secs_f64() });
        Ok(())
    }
}
