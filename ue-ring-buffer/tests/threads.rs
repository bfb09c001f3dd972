//! Runs the producer and consumer halves on separate threads.
//!
//! On the host, critical sections are provided by the `std` implementation of `critical-section`.


use std::thread;

use ue_ring_buffer::RingBuffer;


const BYTE_COUNT: usize = 100_000;


fn expected_byte(index: usize) -> u8 {
    // a prime period so that the pattern does not line up with the storage size
    (index % 251) as u8
}

fn transfer(storage_size: usize, producer_in_critical_section: bool) {
    let mut storage = vec![0u8; storage_size];
    let mut buf = RingBuffer::new(&mut storage);
    let (mut producer, mut consumer) = buf.split();

    let received = thread::scope(|scope| {
        scope.spawn(move || {
            for i in 0..BYTE_COUNT {
                loop {
                    let pushed = if producer_in_critical_section {
                        critical_section::with(|_| producer.push(expected_byte(i)))
                    } else {
                        producer.push(expected_byte(i))
                    };
                    if pushed {
                        break;
                    }
                    thread::yield_now();
                }
            }
        });

        let consumer_thread = scope.spawn(move || {
            let mut received = 0usize;
            while received < BYTE_COUNT {
                match consumer.pop() {
                    Some(b) => {
                        assert_eq!(b, expected_byte(received), "byte {} out of order", received);
                        received += 1;
                    },
                    None => thread::yield_now(),
                }
            }
            received
        });

        consumer_thread.join().unwrap()
    });

    assert_eq!(received, BYTE_COUNT);
    assert!(buf.is_empty());
    assert_eq!(buf.pop(), None);
}


#[test]
fn test_transfer_small() {
    transfer(4, false);
}

#[test]
fn test_transfer_single_slot() {
    transfer(2, false);
}

#[test]
fn test_transfer_large() {
    transfer(256, false);
}

#[test]
fn test_transfer_nested_critical_section() {
    transfer(16, true);
}
