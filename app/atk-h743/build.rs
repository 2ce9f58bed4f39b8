// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::env;
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

/// This image owns flash sector 0 only; the kernel starts at sector 1.
const FLASH: (u32, u32) = (0x0800_0000, 128 * 1024);
/// AXI SRAM.
const RAM: (u32, u32) = (0x2400_0000, 512 * 1024);

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let out = PathBuf::from(env::var_os("OUT_DIR").ok_or("OUT_DIR unset")?);

    // Put the linker script somewhere the linker can find it
    let mut linkscr = File::create(out.join("memory.x"))?;
    writeln!(linkscr, "MEMORY\n{{")?;
    writeln!(
        linkscr,
        "  FLASH (rx) : ORIGIN = {:#010x}, LENGTH = {:#x}",
        FLASH.0, FLASH.1
    )?;
    writeln!(
        linkscr,
        "  RAM (rwx) : ORIGIN = {:#010x}, LENGTH = {:#x}",
        RAM.0, RAM.1
    )?;
    writeln!(linkscr, "}}")?;
    drop(linkscr);

    println!("cargo:rustc-link-search={}", out.display());
    // cortex-m-rt's link.x includes memory.x. Host builds use neither.
    if env::var("CARGO_CFG_TARGET_OS").as_deref() == Ok("none") {
        println!("cargo:rustc-link-arg-bins=-Tlink.x");
    }
    println!("cargo:rerun-if-changed=build.rs");
    Ok(())
}
