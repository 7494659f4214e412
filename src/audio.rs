use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

/// The three sounds the simulation can ask for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AudioSignal {
    GloveHit,
    HeadHit,
    RoundEnd,
}

impl AudioSignal {
    pub const ALL: [AudioSignal; 3] = [
        AudioSignal::GloveHit,
        AudioSignal::HeadHit,
        AudioSignal::RoundEnd,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler = Rc<dyn Fn()>;

// ==================== Bus ====================
/// Synchronous publish/subscribe for `AudioSignal`s. Every subscriber of a
/// signal runs once per `emit`, in subscription order.
#[derive(Default)]
pub struct AudioBus {
    handlers: RefCell<Vec<(SubscriptionId, AudioSignal, Handler)>>,
    next_id: Cell<u64>,
}

impl AudioBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, signal: AudioSignal, handler: impl Fn() + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.handlers
            .borrow_mut()
            .push((id, signal, Rc::new(handler)));
        id
    }

    /// Returns whether the subscription was still there
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut handlers = self.handlers.borrow_mut();
        let before = handlers.len();
        handlers.retain(|(other, _, _)| *other != id);
        handlers.len() != before
    }

    pub fn emit(&self, signal: AudioSignal) {
        // snapshot first: a handler may (un)subscribe while we iterate
        let handlers: Vec<Handler> = self
            .handlers
            .borrow()
            .iter()
            .filter(|(_, other, _)| *other == signal)
            .map(|(_, _, handler)| Rc::clone(handler))
            .collect();
        for handler in handlers {
            handler();
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.handlers.borrow().len()
    }
}

// ==================== Manager ====================
pub trait AudioBackend {
    fn play_glove_hit(&mut self);
    fn play_head_hit(&mut self);
    fn play_round_end_bell(&mut self);
}

// repeated signals closer than this collapse into one sound
const DEBOUNCE_MS: f64 = 50.0;

/// Turns bus signals into backend calls, gated by `should_play` (sound
/// option) and debounced per signal
pub struct AudioManager<B: AudioBackend> {
    backend: B,
    should_play: Box<dyn Fn() -> bool>,
    clock: Box<dyn Fn() -> f64>,
    last_played: HashMap<AudioSignal, f64>,
}

impl<B: AudioBackend + 'static> AudioManager<B> {
    pub fn new(
        backend: B,
        should_play: impl Fn() -> bool + 'static,
        clock: impl Fn() -> f64 + 'static,
    ) -> Self {
        AudioManager {
            backend,
            should_play: Box::new(should_play),
            clock: Box::new(clock),
            last_played: HashMap::new(),
        }
    }

    /// Subscribes the shared manager to every signal on `bus`
    pub fn attach(manager: &Rc<RefCell<Self>>, bus: &AudioBus) -> Vec<SubscriptionId> {
        AudioSignal::ALL
            .iter()
            .map(|&signal| {
                let manager = Rc::clone(manager);
                bus.subscribe(signal, move || {
                    if let Ok(mut manager) = manager.try_borrow_mut() {
                        manager.handle(signal);
                    }
                })
            })
            .collect()
    }

    pub fn handle(&mut self, signal: AudioSignal) {
        if !(self.should_play)() {
            return;
        }
        let now = (self.clock)();
        if let Some(last) = self.last_played.get(&signal) {
            if now - last < DEBOUNCE_MS {
                return;
            }
        }
        self.last_played.insert(signal, now);

        match signal {
            AudioSignal::GloveHit => self.backend.play_glove_hit(),
            AudioSignal::HeadHit => self.backend.play_head_hit(),
            AudioSignal::RoundEnd => self.backend.play_round_end_bell(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }
}

// ==================== Web Audio ====================
pub mod web {
    use super::AudioBackend;
    use anyhow::{anyhow, Result};
    use web_sys::{AudioContext, OscillatorType};

    /// Square and triangle wave blips in the spirit of an old sound chip
    pub struct WebAudioBackend {
        context: AudioContext,
    }

    impl WebAudioBackend {
        pub fn new(context: AudioContext) -> Self {
            WebAudioBackend { context }
        }

        fn tone(
            &self,
            frequency: f32,
            offset_s: f64,
            duration_s: f64,
            wave: OscillatorType,
            volume: f32,
        ) -> Result<()> {
            let start = self.context.current_time() + offset_s;
            let oscillator = self
                .context
                .create_oscillator()
                .map_err(|err| anyhow!("Could not create oscillator : {:#?}", err))?;
            let gain = self
                .context
                .create_gain()
                .map_err(|err| anyhow!("Could not create gain : {:#?}", err))?;

            oscillator.set_type(wave);
            oscillator.frequency().set_value(frequency);
            gain.gain().set_value(volume);

            oscillator
                .connect_with_audio_node(&gain)
                .map_err(|err| anyhow!("Could not connect oscillator : {:#?}", err))?;
            gain.connect_with_audio_node(&self.context.destination())
                .map_err(|err| anyhow!("Could not connect gain : {:#?}", err))?;

            oscillator
                .start_with_when(start)
                .map_err(|err| anyhow!("Could not start tone : {:#?}", err))?;
            oscillator
                .stop_with_when(start + duration_s)
                .map_err(|err| anyhow!("Could not stop tone : {:#?}", err))?;
            Ok(())
        }

        fn play(&self, tones: &[(f32, f64, f64, OscillatorType)]) {
            // contexts start suspended until the first user gesture
            let _ = self.context.resume();
            for &(frequency, offset_s, duration_s, wave) in tones {
                if let Err(err) = self.tone(frequency, offset_s, duration_s, wave, 0.15) {
                    error!("{:#}", err);
                }
            }
        }
    }

    impl AudioBackend for WebAudioBackend {
        fn play_glove_hit(&mut self) {
            self.play(&[(1200.0, 0.0, 0.018, OscillatorType::Square)]);
        }

        fn play_head_hit(&mut self) {
            // low smash plus the glove click on top
            self.play(&[
                (90.0, 0.0, 0.18, OscillatorType::Square),
                (1400.0, 0.0, 0.018, OscillatorType::Square),
            ]);
        }

        fn play_round_end_bell(&mut self) {
            self.play(&[
                (880.0, 0.0, 0.28, OscillatorType::Triangle),
                (880.0, 0.34, 0.28, OscillatorType::Triangle),
            ]);
        }
    }
}
