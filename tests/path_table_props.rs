mod common;

use std::collections::BTreeSet;

use common::{craft, u64s};
use fsimage::image::path_table::{decode, encode};
use fsimage::{Image, ImageBuilder};
use proptest::prelude::*;

/// Ascending small offsets, so some tables pass validation and some do not.
fn offset_bytes() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(0u64..96, 0..8).prop_map(|mut v| {
        v.sort_unstable();
        u64s(&v)
    })
}

fn path_list() -> impl Strategy<Value = Vec<String>> {
    prop::collection::btree_set("/[a-z0-9._-]{1,12}(/[a-z0-9._-]{1,12}){0,3}", 1..24)
        .prop_map(|set: BTreeSet<String>| set.into_iter().collect::<Vec<_>>())
        .prop_shuffle()
}

proptest! {
    #[test]
    fn decode_inverts_encode(paths in path_list()) {
        let table = encode(&paths).unwrap();
        let decoded = decode(&table).unwrap();

        prop_assert_eq!(decoded.len(), paths.len());
        for (i, (path, id)) in decoded.into_iter().enumerate() {
            prop_assert_eq!(id, i);
            prop_assert_eq!(path, paths[i].as_str());
        }
    }

    #[test]
    fn every_file_reads_back(
        files in prop::collection::btree_map("/[a-z]{1,8}(/[a-z]{1,8}){0,2}", prop::collection::vec(any::<u8>(), 0..256), 1..16),
        compress in any::<bool>(),
    ) {
        let mut b = ImageBuilder::new("/");
        if compress && cfg!(feature = "zstd") {
            b = b.compress(1);
        }
        for (p, c) in &files {
            b.add_file(p.clone(), c.clone()).unwrap();
        }
        let bytes = b.finish().unwrap();
        let img = Image::open(&bytes).unwrap();

        prop_assert_eq!(img.file_count(), files.len());
        for (p, c) in &files {
            let got = img.read_file(p).unwrap();
            prop_assert_eq!(&*got, &c[..]);
        }
    }

    #[test]
    fn random_bytes_never_panic(bytes in prop::collection::vec(any::<u8>(), 0..512)) {
        let _ = Image::open(&bytes);
    }

    #[test]
    fn sealed_images_never_panic(
        flags in 0u32..4,
        legacy in any::<bool>(),
        paths in path_list(),
        files in prop::collection::vec(any::<u8>(), 0..96),
        offsets in offset_bytes(),
        wd in prop::collection::vec(any::<u8>(), 0..8),
        blob in prop::collection::vec(any::<u8>(), 0..96),
        c_offsets in offset_bytes(),
        sizes in offset_bytes(),
        trailer in prop::collection::vec(any::<u8>(), 0..4),
    ) {
        let table = encode(&paths).unwrap();
        let all: [&[u8]; 7] = [&table, &files, &offsets, &wd, &blob, &c_offsets, &sizes];
        let bytes = if legacy {
            craft(flags, 4, &all[..4], &trailer)
        } else {
            craft(flags, 7, &all, &trailer)
        };

        if let Ok(img) = Image::open(&bytes) {
            prop_assert_eq!(img.file_count(), paths.len());
            for p in &paths {
                let _ = img.read_file(p);
                let _ = img.metadata(p);
            }
            let _ = img.verify();
            let _ = img.read_dir("/");
        }
    }
}
