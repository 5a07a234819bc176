use ethers::prelude::abigen;

abigen!(
    INftxLpStaking,
    r#"[
        function nftxVaultFactory() external view returns (address)
        function stakingTokenProvider() external view returns (address)
    ]"#
);
