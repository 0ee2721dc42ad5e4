//! Reusable simulation fixtures.
//!
//! A minimal idle game over one resource and one generator:
//!
//! - [`CollectHandler`] (`COLLECT`): adds `payload.amount` gold, clamped to capacity.
//! - [`PurchaseHandler`] (`PURCHASE`): buys `payload.count` of `payload.generatorId`.
//! - [`ForageHandler`] (`FORAGE`): one PRD draw; a success adds 1 gold.
//! - [`ProductionSystem`]: each owned generator produces every step.
//!
//! Balance numbers come from the content pack, so handler behaviour
//! depends on content exactly the way a real game's does.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use stepwise_core::{
    from_value, to_value, Command, CommandPriority, ContentDigest, ContentPack, Step, Value,
    ValueError,
};
use stepwise_engine::{
    CommandHandler, ConfigError, HandlerError, RestoreError, Runtime, RuntimeConfig,
    SimulationState, StateSections, StepContext, System,
};

/// The fixture's only resource.
pub const GOLD: &str = "gold";
/// The fixture's only generator.
pub const MINE: &str = "mine";
/// Digest declared by the fixture content pack.
pub const FIXTURE_DIGEST_HASH: &str = "fnv1a-00000000";

/// Gold granted by a successful forage.
const FORAGE_YIELD: f64 = 1.0;
/// Nominal forage success chance.
const FORAGE_CHANCE: f64 = 0.25;

/// The single-resource content pack with the fixed digest `fnv1a-00000000`.
pub fn fixture_content() -> ContentPack {
    let document = Value::object([
        (
            "resources",
            Value::Array(vec![Value::object([
                ("id", Value::from(GOLD)),
                ("capacity", Value::from(1_000.0)),
            ])]),
        ),
        (
            "generators",
            Value::Array(vec![Value::object([
                ("id", Value::from(MINE)),
                ("produces", Value::from(GOLD)),
                ("ratePerSecond", Value::from(0.5)),
                ("cost", Value::from(10.0)),
            ])]),
        ),
    ]);
    ContentPack {
        id: "fixture-pack".into(),
        version: "1.0.0".into(),
        digest: ContentDigest {
            version: 1,
            hash: FIXTURE_DIGEST_HASH.into(),
        },
        document,
    }
}

// ── state ──────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResourceState {
    pub amount: f64,
    pub capacity: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GeneratorState {
    pub owned: u32,
}

/// Resource and generator state for the fixture pack.
#[derive(Clone, Debug, PartialEq)]
pub struct FixtureState {
    pub resources: BTreeMap<String, ResourceState>,
    pub generators: BTreeMap<String, GeneratorState>,
}

impl FixtureState {
    /// Fresh state sized from `content`.
    pub fn from_content(content: &ContentPack) -> Self {
        let mut resources = BTreeMap::new();
        for def in list(content, "resources") {
            if let Some(id) = def.get("id").and_then(Value::as_str) {
                let capacity = def.get("capacity").and_then(Value::as_f64).unwrap_or(f64::MAX);
                resources.insert(
                    id.to_owned(),
                    ResourceState {
                        amount: 0.0,
                        capacity,
                    },
                );
            }
        }
        let generators = list(content, "generators")
            .iter()
            .filter_map(|def| def.get("id").and_then(Value::as_str))
            .map(|id| (id.to_owned(), GeneratorState::default()))
            .collect();
        Self {
            resources,
            generators,
        }
    }

    /// Current gold amount.
    pub fn gold(&self) -> f64 {
        self.resources.get(GOLD).map_or(0.0, |r| r.amount)
    }

    /// Owned count of `generator`.
    pub fn owned(&self, generator: &str) -> u32 {
        self.generators.get(generator).map_or(0, |g| g.owned)
    }

    fn add(&mut self, resource: &str, amount: f64) -> Result<(), HandlerError> {
        let r = self
            .resources
            .get_mut(resource)
            .ok_or_else(|| HandlerError::failed(format!("unknown resource '{resource}'")))?;
        r.amount = (r.amount + amount).min(r.capacity);
        Ok(())
    }
}

impl SimulationState for FixtureState {
    fn capture(&self) -> Result<StateSections, ValueError> {
        Ok(StateSections {
            resources: to_value(&self.resources)?,
            progression: Value::object([("generators", to_value(&self.generators)?)]),
            automation: Value::empty_object(),
            transforms: Value::empty_object(),
            entities: Value::empty_object(),
        })
    }

    fn restore(&mut self, sections: &StateSections) -> Result<(), RestoreError> {
        let resources = from_value(&sections.resources)
            .map_err(|e| RestoreError::new("resources", e.to_string()))?;
        let generators = sections
            .progression
            .get("generators")
            .ok_or_else(|| RestoreError::new("progression", "missing generators"))?;
        let generators = from_value(generators)
            .map_err(|e| RestoreError::new("progression", e.to_string()))?;
        self.resources = resources;
        self.generators = generators;
        Ok(())
    }
}

// ── handlers ───────────────────────────────────────────────────────

/// `COLLECT {amount}`: add gold.
pub struct CollectHandler;

impl CommandHandler<FixtureState> for CollectHandler {
    fn handle(
        &self,
        command: &Command,
        ctx: &mut StepContext<'_, FixtureState>,
    ) -> Result<(), HandlerError> {
        let amount = number_field(&command.payload, "amount")?;
        if amount < 0.0 {
            return Err(HandlerError::invalid_payload("amount", "must be non-negative"));
        }
        ctx.state_mut().add(GOLD, amount)
    }
}

/// `PURCHASE {generatorId, count}`: buy generators with their produced resource.
pub struct PurchaseHandler;

impl CommandHandler<FixtureState> for PurchaseHandler {
    fn handle(
        &self,
        command: &Command,
        ctx: &mut StepContext<'_, FixtureState>,
    ) -> Result<(), HandlerError> {
        let id = command
            .payload
            .get("generatorId")
            .and_then(Value::as_str)
            .ok_or_else(|| HandlerError::invalid_payload("generatorId", "expected a string"))?;
        let count = command
            .payload
            .get("count")
            .and_then(Value::as_u64)
            .ok_or_else(|| HandlerError::invalid_payload("count", "expected an integer"))?;
        let def = find(ctx.content(), "generators", id)
            .ok_or_else(|| HandlerError::failed(format!("unknown generator '{id}'")))?;
        let cost = number_field(def, "cost")? * count as f64;
        let resource = def
            .get("produces")
            .and_then(Value::as_str)
            .unwrap_or(GOLD)
            .to_owned();

        let owned = u32::try_from(count)
            .map_err(|_| HandlerError::invalid_payload("count", "too large"))?;

        let state = ctx.state_mut();
        let balance = state.resources.get(&resource).map_or(0.0, |r| r.amount);
        if balance < cost {
            // Unaffordable purchases are a no-op.
            return Ok(());
        }
        state.add(&resource, -cost)?;
        state.generators.entry(id.to_owned()).or_default().owned += owned;
        Ok(())
    }
}

/// `FORAGE`: PRD-driven chance of one gold.
pub struct ForageHandler;

impl CommandHandler<FixtureState> for ForageHandler {
    fn handle(
        &self,
        _command: &Command,
        ctx: &mut StepContext<'_, FixtureState>,
    ) -> Result<(), HandlerError> {
        if ctx.roll_prd("forage", FORAGE_CHANCE) {
            ctx.state_mut().add(GOLD, FORAGE_YIELD)?;
        }
        Ok(())
    }
}

// ── systems ────────────────────────────────────────────────────────

/// Adds `owned * ratePerSecond * step` of each generator's resource.
pub struct ProductionSystem;

impl System<FixtureState> for ProductionSystem {
    fn name(&self) -> &str {
        "production"
    }

    fn tick(&mut self, ctx: &mut StepContext<'_, FixtureState>) -> Result<(), HandlerError> {
        let seconds = ctx.step_size_ms() / 1_000.0;
        let mut produced = Vec::new();
        for def in list(ctx.content(), "generators") {
            let Some(id) = def.get("id").and_then(Value::as_str) else {
                continue;
            };
            let owned = ctx.state().owned(id);
            if owned == 0 {
                continue;
            }
            let rate = number_field(def, "ratePerSecond")?;
            let resource = def.get("produces").and_then(Value::as_str).unwrap_or(GOLD);
            produced.push((resource.to_owned(), f64::from(owned) * rate * seconds));
        }
        for (resource, amount) in produced {
            ctx.state_mut().add(&resource, amount)?;
        }
        Ok(())
    }
}

// ── runtime construction ───────────────────────────────────────────

/// Build a fixture runtime: state sized from `content`, every handler
/// registered, production system added.
///
/// Matches the factory signature the replay runner expects.
pub fn build_runtime(
    config: RuntimeConfig,
    content: ContentPack,
) -> Result<Runtime<FixtureState>, ConfigError> {
    let state = FixtureState::from_content(&content);
    let mut runtime = Runtime::new(config, content, state)?;
    runtime.register_handler("COLLECT", CollectHandler);
    runtime.register_handler("PURCHASE", PurchaseHandler);
    runtime.register_handler("FORAGE", ForageHandler);
    runtime.add_system(ProductionSystem);
    Ok(runtime)
}

/// [`build_runtime`] with the default config and [`fixture_content`].
pub fn default_runtime() -> Runtime<FixtureState> {
    match build_runtime(RuntimeConfig::default(), fixture_content()) {
        Ok(runtime) => runtime,
        Err(e) => panic!("default fixture config is invalid: {e}"),
    }
}

// ── command helpers ────────────────────────────────────────────────

/// `COLLECT` of `amount` gold at `step`.
pub fn collect(amount: f64, step: u64) -> Command {
    Command::new("COLLECT", CommandPriority::Player, Step(step))
        .with_payload(Value::object([("amount", Value::from(amount))]))
        .with_timestamp(step as f64 * 100.0)
}

/// `PURCHASE` of `count` generators at `step`.
pub fn purchase(generator: &str, count: u32, step: u64) -> Command {
    Command::new("PURCHASE", CommandPriority::Player, Step(step))
        .with_payload(Value::object([
            ("generatorId", Value::from(generator)),
            ("count", Value::from(count)),
        ]))
        .with_timestamp(step as f64 * 100.0)
}

/// `FORAGE` issued by automation at `step`.
pub fn forage(step: u64) -> Command {
    Command::new("FORAGE", CommandPriority::Automation, Step(step))
        .with_timestamp(step as f64 * 100.0)
}

// ── content lookups ────────────────────────────────────────────────

fn list<'a>(content: &'a ContentPack, key: &str) -> &'a [Value] {
    content
        .document
        .get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

fn find<'a>(content: &'a ContentPack, key: &str, id: &str) -> Option<&'a Value> {
    list(content, key)
        .iter()
        .find(|def| def.get("id").and_then(Value::as_str) == Some(id))
}

fn number_field(value: &Value, field: &str) -> Result<f64, HandlerError> {
    value
        .get(field)
        .and_then(Value::as_f64)
        .ok_or_else(|| HandlerError::invalid_payload(field, "expected a number"))
}
