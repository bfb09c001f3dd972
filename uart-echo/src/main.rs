#![no_main]
#![no_std]


mod debug_log;
mod uart;


use core::panic::PanicInfo;

use cortex_m::peripheral::NVIC;
use cortex_m_rt::entry;
use stm32f7::stm32f745::{Interrupt, Peripherals};
use ue_ring_buffer::RingBuffer;

use crate::debug_log::debug_log;
use crate::uart::{Uart, Usart2, Usart3};


pub const CLOCK_SPEED_HZ: u32 = 16_000_000;

/// Baud rate of the UART whose input is echoed.
pub const ECHO_BAUD_RATE: u32 = 57_600;

/// Baud rate of the debugging UART.
pub const DEBUG_BAUD_RATE: u32 = 9_600;

/// Size of the receive ring buffer's storage; one byte less is usable.
pub const RX_BUFFER_SIZE: usize = 256;


type EchoUart = Usart2;
pub(crate) type DebugUart = Usart3;


#[panic_handler]
fn handle_panic(_info: &PanicInfo) -> ! {
    loop {
    }
}


/// Reconfigures the clocks of the microcontroller.
///
/// The board has an external 16 MHz oscillator, which we feed through unchanged:
///
/// ```plain
/// ╭────────╮ ╒══════╕
/// │ HSE    ├─┤ HPRE ├───┬─────────┬─────────┐ AHB (max. 216 MHz)
/// │ 16 MHz │ │   /1 ├┐  │         │         │
/// ╰────────╯ └──────┘│ ┌┴───────┐┌┴───────┐┌┴───────┐
///                    │ │ SYSCLK ││ GPIOA  ││ GPIOD  │
///                    │ │ 16 MHz ││ 16 MHz ││ 16 MHz │
///                    │ └────────┘└────────┘└────────┘
///                    │╒═══════╕
///                    └┤ PPRE1 ├──┬─────────┐ APB1 (max. 54 MHz)
///                     │    /1 │  │         │
///                     └───────┘ ┌┴───────┐┌┴───────┐
///                               │ USART2 ││ USART3 │
///                               │ 16 MHz ││ 16 MHz │
///                               └────────┘└────────┘
/// ```
///
/// The echoed line (USART2) runs at 57600 b/s, so we must solve:
///
/// 57 600 b/s = 16 000 000 b Hz / USARTDIV
///
/// which gives 277.7...; we can fit 278 (0x116) in a 16-bit register.
///
/// The debugging USART gets the venerable 9600 b/s, a USARTDIV of 1667 (0x683).
fn setup_clocks(peripherals: &mut Peripherals) {
    // start up the external high-speed oscillator (HSE)

    // HSEBYP=0: crystal between OSCIN and OSCOUT
    // HSEBYP=1: clock on OSCIN while OSCOUT is floating
    // we have a crystal, not a clock
    peripherals.RCC.cr().modify(|_, w| w
        .hsebyp().clear_bit()
    );

    // turn on HSE
    peripherals.RCC.cr().modify(|_, w| w
        .hseon().set_bit()
    );

    // wait for HSE to become ready
    while peripherals.RCC.cr().read().hserdy().is_not_ready() {
    }

    // set flash wait states
    // we run on 3.3V, which means steps of 30 MHz
    // 0 MHz < 16 MHz < 30 MHz => 0 wait states
    peripherals.FLASH.acr().modify(|_, w| w
        .latency().ws0()
    );

    // set prescalers to /1
    peripherals.RCC.cfgr().modify(|_, w| w
        .hpre().div1() // warning: max. 216 MHz
        .ppre2().div1() // warning: max. 108 MHz
        .ppre1().div1() // warning: max. 54 MHz
    );

    // switch clock input over to HSE
    peripherals.RCC.cfgr().modify(|_, w| w
        .sw().hse()
    );

    // wait until clock input switches over
    while !peripherals.RCC.cfgr().read().sws().is_hse() {
    }

    // feed the clock to the peripherals we want
    peripherals.RCC.ahb1enr().modify(|_, w| w
        .gpioaen().enabled()
        .gpioden().enabled()
    );
    peripherals.RCC.apb1enr().modify(|_, w| w
        .usart2en().enabled()
        .usart3en().enabled()
    );
}

fn setup_pins(peripherals: &mut Peripherals) {
    // choose alternate functions
    peripherals.GPIOA.afrl().modify(|_, w| w
        .afrl2().af7() // PA2 to USART2 Tx
        .afrl3().af7() // PA3 to USART2 Rx
    );
    peripherals.GPIOD.afrh().modify(|_, w| w
        .afrh8().af7() // PD8 to USART3 Tx
        .afrh9().af7() // PD9 to USART3 Rx
    );

    // set push-pull on output ports
    peripherals.GPIOA.otyper().modify(|_, w| w
        .ot2().push_pull()
        .ot3().push_pull()
    );
    peripherals.GPIOD.otyper().modify(|_, w| w
        .ot8().push_pull()
        .ot9().push_pull()
    );

    // idle the receive lines high while nothing is connected
    peripherals.GPIOA.pupdr().modify(|_, w| w
        .pupdr3().pull_up()
    );
    peripherals.GPIOD.pupdr().modify(|_, w| w
        .pupdr9().pull_up()
    );

    // set port modes (input/output/analog/alternate)
    peripherals.GPIOA.moder().modify(|_, w| w
        .moder2().alternate() // USART2
        .moder3().alternate() // USART2
    );
    peripherals.GPIOD.moder().modify(|_, w| w
        .moder8().alternate() // USART3
        .moder9().alternate() // USART3
    );

    // set the echoed UART's ports to fast
    peripherals.GPIOA.ospeedr().modify(|_, w| w
        .ospeedr2().high_speed()
        .ospeedr3().high_speed()
    );
}


const fn divide_u32_to_u16_round(dividend: u32, divisor: u32) -> u16 {
    let quotient = (dividend + (divisor / 2)) / divisor;
    assert!(quotient <= (u16::MAX as u32));
    quotient as u16
}


#[entry]
fn main() -> ! {
    let mut peripherals = unsafe { Peripherals::steal() };

    setup_clocks(&mut peripherals);
    setup_pins(&mut peripherals);

    EchoUart::set_up(
        &peripherals,
        divide_u32_to_u16_round(CLOCK_SPEED_HZ, ECHO_BAUD_RATE),
    );
    DebugUart::set_up(
        &peripherals,
        divide_u32_to_u16_round(CLOCK_SPEED_HZ, DEBUG_BAUD_RATE),
    );

    // the interrupt handler needs the buffer for the rest of the program's life
    let rx_storage: &'static mut [u8; RX_BUFFER_SIZE] = cortex_m::singleton!(
        : [u8; RX_BUFFER_SIZE] = [0; RX_BUFFER_SIZE]
    ).unwrap();
    let rx_ring_buffer: &'static mut RingBuffer<'static> = cortex_m::singleton!(
        : RingBuffer<'static> = RingBuffer::new(rx_storage)
    ).unwrap();
    let (rx_producer, mut rx_consumer) = rx_ring_buffer.split();

    crate::uart::install_receiver(rx_producer);
    EchoUart::enable_receive_interrupt(&peripherals);
    unsafe {
        NVIC::unmask(Interrupt::USART2);
    }

    debug_log!(&peripherals, "echoing; {} bytes of receive buffer", rx_consumer.capacity());

    let mut reported_dropped_bytes = 0;
    loop {
        for byte in rx_consumer.drain() {
            EchoUart::write(&peripherals, &[byte]);
        }

        let dropped_bytes = crate::uart::get_dropped_bytes();
        if dropped_bytes != reported_dropped_bytes {
            debug_log!(
                &peripherals,
                "dropped {} received bytes ({} in total)",
                dropped_bytes.wrapping_sub(reported_dropped_bytes),
                dropped_bytes,
            );
            reported_dropped_bytes = dropped_bytes;
        }
    }
}
