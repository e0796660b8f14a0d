use sleeptimer_core::config::BUTTON_MASK;
use sleeptimer_core::debounce::DEBOUNCE_SAMPLES;
use sleeptimer_core::tick::{SystemTick, TickSource};

fn hold(tick: &SystemTick, level: u8, samples: u8) {
    for _ in 0..samples {
        tick.on_interrupt(level);
    }
}

#[test]
fn single_sample_glitch_is_ignored() {
    let tick = SystemTick::new();
    for _ in 0..10 {
        hold(&tick, BUTTON_MASK, 1);
        hold(&tick, 0, 1);
    }
    assert_eq!(tick.take_pressed(BUTTON_MASK), 0);
    assert_eq!(tick.debounced_keys(), 0);
}

#[test]
fn sustained_press_latches_exactly_once() {
    let tick = SystemTick::new();
    hold(&tick, BUTTON_MASK, DEBOUNCE_SAMPLES);
    hold(&tick, BUTTON_MASK, 200);

    assert_eq!(tick.take_pressed(BUTTON_MASK), BUTTON_MASK);
    assert_eq!(tick.take_pressed(BUTTON_MASK), 0);
}

#[test]
fn release_is_not_reported_as_a_press() {
    let tick = SystemTick::new();
    hold(&tick, BUTTON_MASK, DEBOUNCE_SAMPLES);
    assert_eq!(tick.take_pressed(BUTTON_MASK), BUTTON_MASK);

    hold(&tick, 0, DEBOUNCE_SAMPLES);
    assert_eq!(tick.debounced_keys(), 0);
    assert_eq!(tick.take_pressed(BUTTON_MASK), 0);
}

#[test]
fn press_waits_until_the_main_loop_takes_it() {
    let tick = SystemTick::new();
    hold(&tick, BUTTON_MASK, DEBOUNCE_SAMPLES);
    hold(&tick, 0, DEBOUNCE_SAMPLES);

    assert_eq!(tick.take_pressed(BUTTON_MASK), BUTTON_MASK);
}

#[test]
fn other_keys_are_left_latched() {
    const OTHER: u8 = 0b0000_0100;
    let tick = SystemTick::new();
    hold(&tick, BUTTON_MASK | OTHER, DEBOUNCE_SAMPLES);

    assert_eq!(tick.take_pressed(BUTTON_MASK), BUTTON_MASK);
    assert_eq!(tick.take_pressed(OTHER), OTHER);
}

#[test]
fn every_interrupt_raises_one_tick() {
    let tick = SystemTick::new();
    assert!(!tick.take_tick());
    hold(&tick, 0, 3);
    assert!(tick.take_tick());
    assert!(!tick.take_tick());
}
