use core::cell::RefCell;

use critical_section::Mutex;
use stm32f7::stm32f745::Peripherals;
use stm32f7::stm32f745::{interrupt, usart1};
use ue_ring_buffer::Producer;
use vcell::VolatileCell;


/// Receiving end of the echoed UART; filled by the `USART2` interrupt handler.
static RX_PRODUCER: Mutex<RefCell<Option<Producer<'static>>>> = Mutex::new(RefCell::new(None));

/// Bytes lost because the ring buffer was full or the UART overran.
static DROPPED_BYTES: Mutex<VolatileCell<u32>> = Mutex::new(VolatileCell::new(0));


pub trait Uart {
    fn get_peripheral(peripherals: &Peripherals) -> &usart1::RegisterBlock;
    fn enable_peripheral_clock(peripherals: &Peripherals);

    fn set_up(peripherals: &Peripherals, speed_divisor: u16) {
        let uart = Self::get_peripheral(peripherals);

        // assumes pins are already set up

        // gimme clock
        Self::enable_peripheral_clock(peripherals);

        // set up
        uart.cr1().modify(|_, w| w
            .m0().bit8() // 8 bits per byte
            .m1().m0() // yes, 8 bits per byte
            .over8().oversampling16() // sample 16 bits, not 8
            .pce().disabled() // no hardware parity calculation
        );
        uart.brr().modify(|_, w| w
            .brr().set(speed_divisor)
        );
        uart.cr2().modify(|_, w| w
            .stop().stop1() // 1 stop bit
            .txinv().standard() // transmission pin not inverted
            .rxinv().standard() // reception pin not inverted
            .datainv().positive() // data polarity not inverted
            .msbfirst().clear_bit() // RS232 says least significant byte first
        );

        uart.cr1().modify(|_, w| w
            .ue().enabled() // turn on UART
        );

        uart.cr1().modify(|_, w| w
            .re().enabled() // turn on reception
            .te().enabled() // turn on transmission
        );
    }

    /// Raises the UART interrupt whenever a byte has been received.
    ///
    /// The interrupt still has to be unmasked in the NVIC.
    fn enable_receive_interrupt(peripherals: &Peripherals) {
        let uart = Self::get_peripheral(peripherals);
        uart.cr1().modify(|_, w| w
            .rxneie().enabled() // interrupt on "receive register not empty"
        );
    }

    /// Writes via UART.
    fn write(peripherals: &Peripherals, data: &[u8]) {
        let uart = Self::get_peripheral(peripherals);

        for b in data {
            // wait until transmit buffer is empty
            while uart.isr().read().txe().is_full() {
            }

            // write the byte
            uart.tdr().modify(|_, w| w
                .tdr().set(*b as u16)
            );
        }

        // wait until transmit buffer is empty one last time
        while uart.isr().read().txe().is_full() {
        }
    }

    /// Takes the received byte out of the receive register, if there is one.
    fn take_byte(peripherals: &Peripherals) -> Option<u8> {
        let uart = Self::get_peripheral(peripherals);
        if uart.isr().read().rxne().bit_is_clear() {
            return None;
        }

        // reading RDR clears RXNE; 8 data bits, so the top bit is always zero
        let value = uart.rdr().read().rdr().bits();
        Some((value & 0xFF) as u8)
    }

    /// Acknowledges an overrun, returning whether one happened.
    ///
    /// While the overrun flag is set, the UART stops receiving.
    fn clear_overrun(peripherals: &Peripherals) -> bool {
        let uart = Self::get_peripheral(peripherals);
        if uart.isr().read().ore().bit_is_clear() {
            return false;
        }

        uart.icr().write(|w| w.orecf().clear());
        true
    }
}


macro_rules! implement_uart {
    (
        $struct_name:ident,
        $peripheral_name:ident,
        $rcc_enable_register:ident,
        $rcc_field:ident $(,)?
    ) => {
        pub struct $struct_name;
        impl Uart for $struct_name {
            fn get_peripheral(peripherals: &Peripherals) -> &usart1::RegisterBlock {
                &*peripherals.$peripheral_name
            }

            fn enable_peripheral_clock(peripherals: &Peripherals) {
                peripherals.RCC.$rcc_enable_register().modify(|_, w| w
                    .$rcc_field().set_bit()
                );
            }
        }
    };
}

implement_uart!(Usart2, USART2, apb1enr, usart2en);
implement_uart!(Usart3, USART3, apb1enr, usart3en);


/// Hands the producer half of the receive ring buffer to the `USART2` interrupt handler.
///
/// Until this is called, every received byte is counted as dropped.
pub fn install_receiver(producer: Producer<'static>) {
    critical_section::with(|cs| {
        *RX_PRODUCER.borrow_ref_mut(cs) = Some(producer);
    });
}

pub fn get_dropped_bytes() -> u32 {
    critical_section::with(|cs| {
        DROPPED_BYTES.borrow(cs)
            .get()
    })
}

fn count_dropped_byte() {
    critical_section::with(|cs| {
        let guard = DROPPED_BYTES.borrow(cs);
        guard.set(guard.get().wrapping_add(1));
    });
}


#[interrupt]
fn USART2() {
    // only this handler touches the receiving side of USART2
    let peripherals = unsafe { Peripherals::steal() };

    if Usart2::clear_overrun(&peripherals) {
        // the byte that did not fit into RDR is gone
        count_dropped_byte();
    }

    while let Some(byte) = Usart2::take_byte(&peripherals) {
        // push nests its own critical sections inside this one
        let stored = critical_section::with(|cs| {
            RX_PRODUCER.borrow_ref_mut(cs)
                .as_mut()
                .is_some_and(|producer| producer.push(byte))
        });
        if !stored {
            count_dropped_byte();
        }
    }
}
