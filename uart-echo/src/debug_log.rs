//! Diagnostic output on the debugging UART.


use core::fmt;
use core::marker::PhantomData;

use stm32f7::stm32f745::Peripherals;

use crate::uart::Uart;


/// Writes formatted text to a UART, blocking until every byte is out.
pub struct DebugLog<'p, U: Uart> {
    peripherals: &'p Peripherals,
    uart: PhantomData<U>,
}
impl<'p, U: Uart> DebugLog<'p, U> {
    pub const fn new(peripherals: &'p Peripherals) -> Self {
        Self {
            peripherals,
            uart: PhantomData,
        }
    }
}
impl<U: Uart> fmt::Write for DebugLog<'_, U> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        U::write(self.peripherals, s.as_bytes());
        Ok(())
    }
}


/// Writes one line to the debugging UART.
macro_rules! debug_log {
    ($peripherals:expr, $($arg:tt)*) => {{
        use core::fmt::Write as _;
        let mut log = $crate::debug_log::DebugLog::<$crate::DebugUart>::new($peripherals);
        let _ = write!(log, "{}\r\n", format_args!($($arg)*));
    }};
}
pub(crate) use debug_log;
